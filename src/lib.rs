#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Adaptive sampling and exploration over the unit hypercube.
//!
//! Given a learned score model (a [`ScoreOracle`](oracle::ScoreOracle)) and
//! a base point in `[0, 1]^n`, the samplers in this crate look for nearby
//! points that score well, stay diverse, or would teach the model the most.
//! Each sampler is a cancellable [`SearchTask`] that runs on its own worker
//! thread, streams results through a callback as it finds them, and hands a
//! full acceptance trace to a finalize callback when it ends.
//!
//! # Getting Started
//!
//! ```
//! use std::sync::Arc;
//!
//! use explorer::prelude::*;
//!
//! let examples = vec![
//!     TrainingExample::new(vec![0.9, 0.1, 0.5], 1.0),
//!     TrainingExample::new(vec![0.2, 0.6, 0.5], 0.0),
//! ];
//! let oracle = Arc::new(FnOracle::new(examples, |x: &[f64]| {
//!     Prediction::new(1.0 - (x[0] - 0.8).abs(), 0.01)
//! }));
//!
//! let config = RejectionConfig::default()
//!     .threshold(Threshold::above(0.9))
//!     .n(5)
//!     .seed(42);
//! let handle = RejectionSampler::new(oracle, vec![0.9, 0.1, 0.5], config)
//!     .unwrap()
//!     .on_sample(|p| println!("#{} scored {:.3}", p.index, p.mean))
//!     .start()
//!     .unwrap();
//!
//! let outcome = handle.join().unwrap();
//! assert!(outcome.samples.iter().all(|p| p.mean > 0.9));
//! ```
//!
//! # Samplers
//!
//! | Sampler | Strategy | Output |
//! |---------|----------|--------|
//! | [`RejectionSampler`](sampler::rejection::RejectionSampler) | Threshold rejection with adaptive free-parameter count | [`SearchOutcome`] |
//! | [`GenericRejectionSampler`](sampler::rejection::GenericRejectionSampler) | Same, over any scoring closure and seed pool | [`SearchOutcome`] |
//! | [`MetropolisSampler`](sampler::metropolis::MetropolisSampler) | Random walk with ratio acceptance and a diversity filter | [`SearchOutcome`] |
//! | [`BootstrapSampler`](sampler::bootstrap::BootstrapSampler) | Expected Improvement over frequency-weighted dimension subsets | `Vec<BootstrapSample>` |
//!
//! The [`mixer`] functions are synchronous: crossover hybrids of two
//! parents, migration across several oracles, and jitter around a point.
//! [`analysis`] holds one-dimensional sensitivity sweeps.
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `async` | `SearchHandle::join_async` via tokio | off |
//! | `serde` | `Serialize`/`Deserialize` on configs, points, traces and mix results | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key sampling points | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod analysis;
mod error;
pub mod minimize;
pub mod mixer;
pub mod oracle;
mod rng_util;
pub mod sampler;
mod task;
mod types;

pub use error::{Error, Result};
pub use task::{
    FinalizeCallback, SampleCallback, SearchHandle, SearchOutcome, SearchTask, StopFlag,
};
pub use types::{AcceptanceLogEntry, Prediction, ScoredPoint, Threshold, ThresholdMode};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use explorer::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::minimize::{LocalMinimizer, PatternSearch};
    pub use crate::mixer::{
        MigratedPoint, MigrationConfig, MixConfig, MixOutcome, MixResult, jitter, migrate, mix,
    };
    pub use crate::oracle::{FnOracle, RetrainEffort, ScoreOracle, TrainingExample};
    pub use crate::sampler::bootstrap::{
        BootstrapConfig, BootstrapSample, BootstrapSampler, FrequencyTable,
    };
    pub use crate::sampler::metropolis::{MetropolisConfig, MetropolisSampler};
    pub use crate::sampler::rejection::{
        GenericRejectionSampler, RejectionConfig, RejectionSampler,
    };
    pub use crate::task::{SearchHandle, SearchOutcome, SearchTask, StopFlag};
    pub use crate::types::{
        AcceptanceLogEntry, Prediction, ScoredPoint, Threshold, ThresholdMode,
    };
}
