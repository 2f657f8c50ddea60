//! Cancellable search tasks.
//!
//! Every sampler implements [`SearchTask`]. A task is consumed by
//! [`start`](SearchTask::start), which moves it onto a named worker thread
//! and returns a [`SearchHandle`]; since the task is moved, it can only
//! ever be started once. The handle is the driver's token for the run:
//! [`stop`](SearchHandle::stop) asks the loop to exit at the top of its next
//! iteration, and [`join`](SearchHandle::join) blocks until the loop has
//! exited and every callback for the run has fired.
//!
//! ```
//! use std::sync::Arc;
//!
//! use explorer::oracle::{FnOracle, TrainingExample};
//! use explorer::sampler::rejection::{RejectionConfig, RejectionSampler};
//! use explorer::{Prediction, SearchTask, Threshold};
//!
//! let examples = vec![
//!     TrainingExample::new(vec![0.1, 0.9], 1.0),
//!     TrainingExample::new(vec![0.4, 0.2], 0.5),
//! ];
//! let oracle = Arc::new(FnOracle::new(examples, |x: &[f64]| Prediction::new(x[0], 0.0)));
//!
//! let config = RejectionConfig::default()
//!     .threshold(Threshold::above(0.5))
//!     .n(3)
//!     .seed(42);
//! let sampler = RejectionSampler::new(oracle, vec![0.1, 0.9], config).unwrap();
//!
//! let handle = sampler.start().unwrap();
//! let outcome = handle.join().unwrap();
//! assert!(outcome.samples.iter().all(|s| s.mean > 0.5));
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{Error, Result};
use crate::types::{AcceptanceLogEntry, ScoredPoint};

/// Called once per accepted sample, in acceptance order.
pub type SampleCallback = Box<dyn FnMut(&ScoredPoint) + Send>;

/// Called once at the end of a run with the full trace and the task name.
pub type FinalizeCallback = Box<dyn FnOnce(&[AcceptanceLogEntry], &str) + Send>;

/// A shared, idempotent stop request.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Creates a flag with no stop requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the run stop. Calling this more than once has no further effect.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A unit of cancellable search work.
///
/// Implementors only provide [`run`](SearchTask::run); the loop must check
/// the stop flag once per iteration. [`start`](SearchTask::start) runs it
/// on a dedicated thread.
pub trait SearchTask: Send + Sized + 'static {
    /// What a finished run yields.
    type Output: Send + 'static;

    /// Name used for the worker thread, log events and the finalize callback.
    fn name(&self) -> &str;

    /// Run the search to completion on the current thread.
    ///
    /// # Errors
    ///
    /// Propagates oracle and minimizer failures. Running out of attempts is
    /// not an error.
    fn run(self, stop: &StopFlag) -> Result<Self::Output>;

    /// Run the search on a new worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the thread cannot be created.
    fn start(self) -> Result<SearchHandle<Self::Output>> {
        let stop = StopFlag::new();
        let name = self.name().to_owned();
        let worker_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run(&worker_stop))?;

        trace_debug!(task = %name, "search task started");

        Ok(SearchHandle {
            name,
            stop,
            handle,
        })
    }
}

/// Handle to a running [`SearchTask`].
///
/// Dropping the handle detaches the worker; the run continues until it
/// finishes on its own.
#[derive(Debug)]
pub struct SearchHandle<T> {
    name: String,
    stop: StopFlag,
    handle: JoinHandle<Result<T>>,
}

impl<T> SearchHandle<T> {
    /// The task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests that the run stop at the top of its next iteration.
    pub fn stop(&self) {
        self.stop.request_stop();
        trace_debug!(task = %self.name, "stop requested");
    }

    /// A clone of the run's stop flag.
    #[must_use]
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Whether the worker has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the run has finished and returns its output.
    ///
    /// # Errors
    ///
    /// Returns the run's own error, or [`Error::TaskPanicked`] if the worker
    /// panicked (for example inside a user callback).
    pub fn join(self) -> Result<T> {
        self.handle
            .join()
            .map_err(|payload| Error::TaskPanicked(panic_message(payload.as_ref())))?
    }

    /// Awaits the run without blocking the async runtime.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join), plus [`Error::TaskError`] if the
    /// blocking join itself fails.
    #[cfg(feature = "async")]
    pub async fn join_async(self) -> Result<T>
    where
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(move || self.join())
            .await
            .map_err(|e| Error::TaskError(e.to_string()))?
    }
}

/// What a rejection or Metropolis run produced.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchOutcome {
    /// Accepted samples in acceptance order.
    pub samples: Vec<ScoredPoint>,
    /// One entry per proposal.
    pub trace: Vec<AcceptanceLogEntry>,
    /// How many samples the run was asked for.
    pub requested: usize,
    /// Whether the run ended because a stop was requested.
    pub stopped: bool,
}

impl SearchOutcome {
    pub(crate) fn new(requested: usize) -> Self {
        Self {
            requested,
            ..Self::default()
        }
    }

    /// Number of requested samples the run did not find.
    #[must_use]
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.samples.len())
    }

    /// Fraction of proposals that were not accepted, or `0.0` for an empty trace.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rejection_rate(&self) -> f64 {
        if self.trace.is_empty() {
            return 0.0;
        }
        let rejected = self.trace.iter().filter(|e| !e.accepted).count();
        rejected as f64 / self.trace.len() as f64
    }
}

/// Hands the trace to the finalize callback, then surfaces any run error.
pub(crate) fn finish(
    name: &str,
    outcome: SearchOutcome,
    failure: Option<Error>,
    on_finalize: Option<FinalizeCallback>,
) -> Result<SearchOutcome> {
    trace_info!(
        task = name,
        accepted = outcome.samples.len(),
        proposals = outcome.trace.len(),
        rejection_rate = outcome.rejection_rate(),
        "finalizing sampler"
    );
    if let Some(finalize) = on_finalize {
        finalize(&outcome.trace, name);
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(outcome),
    }
}

fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
