//! Adaptive rejection sampling.
//!
//! Both samplers in this module run the same loop. Every attempt builds a
//! candidate from the base point `x0`:
//!
//! 1. The filter is shuffled and its first `current_free_params` indices
//!    become the dimensions allowed to vary this attempt.
//! 2. A random seed point is copied into every filter dimension, so
//!    combinations of fixed values that scored well before can leak in.
//! 3. The selected dimensions are overwritten with uniform `[0, 1]` draws.
//!
//! The candidate is scored and tested against a [`Threshold`] (and an
//! optional minimum score separation from earlier samples). Each acceptance
//! frees one more dimension, up to the ceiling; more than `retries`
//! consecutive rejections fix one dimension, down to the floor. The run
//! stops after `n` acceptances, after `limit` proposals, or on a stop
//! request.
//!
//! [`RejectionSampler`] scores with a [`ScoreOracle`] and seeds from its
//! positive examples. [`GenericRejectionSampler`] takes any scoring
//! closure and an explicit seed pool.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `threshold` | `gt 0.7` | Acceptance test on the mean score |
//! | `free_params` | 1000 | Free-parameter ceiling, clamped to the filter size |
//! | `n` | 10 | Samples to collect |
//! | `param_floor` | 3 | Free-parameter floor, clamped to the ceiling |
//! | `retries` | 20 | Consecutive rejections tolerated before fixing a dimension |
//! | `limit` | 10 000 | Total proposals before giving up (`None` for no limit) |
//! | `filter` | oracle filter | Dimensions that may vary |
//! | `score_delta` | none | Minimum score difference between accepted samples |
//! | `seed` | random | RNG seed for reproducibility |

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::oracle::ScoreOracle;
use crate::rng_util;
use crate::sampler::common::{is_score_separated, validate_dim, validate_filter};
use crate::task::{FinalizeCallback, SampleCallback, SearchOutcome, SearchTask, StopFlag, finish};
use crate::types::{AcceptanceLogEntry, Prediction, ScoredPoint, Threshold};

/// Default free-parameter ceiling.
const DEFAULT_FREE_PARAMS: usize = 1000;
/// Default number of samples.
const DEFAULT_N: usize = 10;
/// Default free-parameter floor.
const DEFAULT_PARAM_FLOOR: usize = 3;
/// Default consecutive rejections before contracting.
const DEFAULT_RETRIES: usize = 20;
/// Default proposal budget.
const DEFAULT_LIMIT: usize = 10_000;

/// Configuration shared by [`RejectionSampler`] and [`GenericRejectionSampler`].
///
/// Fields are public; the chainable setters are a convenience.
///
/// ```
/// use explorer::sampler::rejection::RejectionConfig;
/// use explorer::Threshold;
///
/// let config = RejectionConfig::default()
///     .name("bricks")
///     .threshold(Threshold::abs_radius(0.8, 0.05))
///     .n(4)
///     .free_params(6)
///     .param_floor(2)
///     .seed(7);
/// assert_eq!(config.n, 4);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RejectionConfig {
    /// Task name used in logs and the finalize callback.
    pub name: String,
    /// Acceptance test on the mean score.
    pub threshold: Threshold,
    /// Free-parameter ceiling.
    pub free_params: usize,
    /// Samples to collect.
    pub n: usize,
    /// Free-parameter floor.
    pub param_floor: usize,
    /// Consecutive rejections tolerated before fixing a dimension.
    pub retries: usize,
    /// Total proposal budget.
    pub limit: Option<usize>,
    /// Explicit dimension filter overriding the oracle's.
    pub filter: Option<Vec<usize>>,
    /// Minimum score difference between accepted samples.
    pub score_delta: Option<f64>,
    /// RNG seed.
    pub seed: Option<u64>,
}

impl Default for RejectionConfig {
    fn default() -> Self {
        Self {
            name: "rejection".to_owned(),
            threshold: Threshold::default(),
            free_params: DEFAULT_FREE_PARAMS,
            n: DEFAULT_N,
            param_floor: DEFAULT_PARAM_FLOOR,
            retries: DEFAULT_RETRIES,
            limit: Some(DEFAULT_LIMIT),
            filter: None,
            score_delta: None,
            seed: None,
        }
    }
}

impl RejectionConfig {
    /// Sets the task name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the acceptance test.
    #[must_use]
    pub fn threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the free-parameter ceiling.
    #[must_use]
    pub fn free_params(mut self, free_params: usize) -> Self {
        self.free_params = free_params;
        self
    }

    /// Sets the number of samples to collect.
    #[must_use]
    pub fn n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// Sets the free-parameter floor.
    #[must_use]
    pub fn param_floor(mut self, floor: usize) -> Self {
        self.param_floor = floor;
        self
    }

    /// Sets the consecutive-rejection budget.
    #[must_use]
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the total proposal budget; `None` removes it.
    #[must_use]
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Restricts the search to an explicit set of dimensions.
    #[must_use]
    pub fn filter(mut self, filter: Vec<usize>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Requires accepted scores to differ by at least `delta`.
    #[must_use]
    pub fn score_delta(mut self, delta: f64) -> Self {
        self.score_delta = Some(delta);
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        self.threshold.validate()?;
        if let Some(delta) = self.score_delta
            && (delta < 0.0 || delta.is_nan())
        {
            return Err(Error::invalid("score_delta", format!("{delta} must be non-negative")));
        }
        Ok(())
    }
}

/// The live free-parameter count and its expand/contract rules.
///
/// `current` always stays within `[floor, ceiling]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FreeParams {
    current: usize,
    ceiling: usize,
    floor: usize,
    retries: usize,
    consecutive: usize,
}

impl FreeParams {
    /// Clamps the ceiling to the filter size and the floor to the ceiling.
    pub(crate) fn new(requested: usize, floor: usize, retries: usize, filter_len: usize) -> Self {
        let ceiling = requested.min(filter_len);
        Self {
            current: ceiling,
            ceiling,
            floor: floor.min(ceiling),
            retries,
            consecutive: 0,
        }
    }

    pub(crate) fn current(&self) -> usize {
        self.current
    }

    pub(crate) fn consecutive(&self) -> usize {
        self.consecutive
    }

    pub(crate) fn on_accept(&mut self) {
        self.consecutive = 0;
        if self.current < self.ceiling {
            self.current += 1;
            trace_info!(free_params = self.current, "sample accepted, raising free params");
        }
    }

    pub(crate) fn on_reject(&mut self) {
        self.consecutive += 1;
        if self.consecutive > self.retries && self.current > self.floor {
            self.current -= 1;
            self.consecutive = 0;
            trace_info!(free_params = self.current, "retry limit reached, lowering free params");
        }
    }
}

/// Inputs of one adaptive rejection run.
struct AdaptiveRun<'a> {
    x0: &'a [f64],
    filter: Vec<usize>,
    seeds: &'a [Vec<f64>],
    config: &'a RejectionConfig,
    rng: fastrand::Rng,
}

impl AdaptiveRun<'_> {
    /// Build the next candidate from `x0`, a random seed and `n_free` uniform draws.
    fn propose(&mut self, n_free: usize) -> Vec<f64> {
        self.rng.shuffle(&mut self.filter);

        let mut xp = self.x0.to_vec();
        if !self.seeds.is_empty() {
            let seed = &self.seeds[self.rng.usize(0..self.seeds.len())];
            for &i in &self.filter {
                xp[i] = seed[i];
            }
        }
        for &i in &self.filter[..n_free] {
            xp[i] = self.rng.f64();
        }
        xp
    }

    /// Runs the loop. Scoring errors end the run; the partial outcome is kept.
    fn execute<S>(
        mut self,
        mut score: S,
        stop: &StopFlag,
        on_sample: &mut Option<SampleCallback>,
    ) -> (SearchOutcome, Option<Error>)
    where
        S: FnMut(&[f64]) -> Result<Prediction>,
    {
        let config = self.config;
        let mut outcome = SearchOutcome::new(config.n);
        let mut free = FreeParams::new(
            config.free_params,
            config.param_floor,
            config.retries,
            self.filter.len(),
        );

        trace_info!(
            task = config.name.as_str(),
            filter = ?self.filter,
            free_params = free.current(),
            seeds = self.seeds.len(),
            "rejection sampler initializing"
        );

        while outcome.samples.len() < config.n {
            if config.limit.is_some_and(|limit| outcome.trace.len() >= limit) {
                trace_info!(task = config.name.as_str(), "proposal limit reached");
                break;
            }
            if stop.is_stop_requested() {
                trace_info!(task = config.name.as_str(), "rejection sampler early stop");
                outcome.stopped = true;
                break;
            }

            let n_free = free.current();
            let xp = self.propose(n_free);
            let prediction = match score(&xp) {
                Ok(p) => p,
                Err(err) => return (outcome, Some(err)),
            };
            trace_debug!(task = config.name.as_str(), mean = prediction.mean, "sample generated");

            let accepted = config.threshold.accepts(prediction.mean)
                && is_score_separated(prediction.mean, &outcome.samples, config.score_delta);

            outcome.trace.push(AcceptanceLogEntry {
                accepted,
                score: prediction.mean,
                free_param_count: n_free,
                attempt_number: free.consecutive(),
                cumulative_count: outcome.trace.len() + 1,
            });

            if accepted {
                let point = ScoredPoint::new(xp, prediction, outcome.samples.len());
                trace_info!(
                    task = config.name.as_str(),
                    index = point.index,
                    n = config.n,
                    mean = point.mean,
                    "sample accepted"
                );
                if let Some(cb) = on_sample.as_mut() {
                    cb(&point);
                }
                outcome.samples.push(point);
                free.on_accept();
            } else {
                free.on_reject();
            }
        }

        (outcome, None)
    }
}

/// Rejection sampler bound to a [`ScoreOracle`].
///
/// Seeds its proposals from the oracle's positive examples; when there are
/// none, fixed dimensions keep their `x0` values. An empty filter is a
/// valid run that only ever re-scores `x0`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use explorer::oracle::{FnOracle, TrainingExample};
/// use explorer::sampler::rejection::{RejectionConfig, RejectionSampler};
/// use explorer::{Prediction, SearchTask, Threshold};
///
/// let examples = vec![
///     TrainingExample::new(vec![0.9, 0.1, 0.5], 1.0),
///     TrainingExample::new(vec![0.1, 0.2, 0.5], 0.0),
/// ];
/// let oracle = Arc::new(FnOracle::new(examples, |x: &[f64]| {
///     Prediction::new(1.0 - (x[0] - 0.8).abs(), 0.01)
/// }));
///
/// let config = RejectionConfig::default()
///     .threshold(Threshold::above(0.9))
///     .n(5)
///     .seed(3);
/// let outcome = RejectionSampler::new(oracle, vec![0.9, 0.1, 0.5], config)
///     .unwrap()
///     .start()
///     .unwrap()
///     .join()
///     .unwrap();
///
/// assert!(outcome.samples.iter().all(|s| s.mean > 0.9));
/// ```
pub struct RejectionSampler {
    oracle: Arc<dyn ScoreOracle>,
    x0: Vec<f64>,
    filter: Vec<usize>,
    config: RejectionConfig,
    on_sample: Option<SampleCallback>,
    on_finalize: Option<FinalizeCallback>,
}

impl RejectionSampler {
    /// Creates a sampler around `x0`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyTrainingSet`] if the oracle has no examples.
    /// - [`Error::DimensionMismatch`] if an example's length differs from `x0`'s.
    /// - [`Error::FilterIndexOutOfRange`] if the filter addresses a missing component.
    /// - [`Error::MissingThresholdTarget`] for a target-based threshold without a target.
    /// - [`Error::InvalidParameter`] for a negative `score_delta`.
    pub fn new(
        oracle: Arc<dyn ScoreOracle>,
        x0: Vec<f64>,
        config: RejectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let examples = oracle.examples();
        if examples.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        for example in &examples {
            validate_dim(&example.x, x0.len())?;
        }
        let filter = config
            .filter
            .clone()
            .unwrap_or_else(|| oracle.active_filter());
        validate_filter(&filter, x0.len())?;

        Ok(Self {
            oracle,
            x0,
            filter,
            config,
            on_sample: None,
            on_finalize: None,
        })
    }

    /// Registers a callback fired for each accepted sample.
    #[must_use]
    pub fn on_sample(mut self, cb: impl FnMut(&ScoredPoint) + Send + 'static) -> Self {
        self.on_sample = Some(Box::new(cb));
        self
    }

    /// Registers a callback fired once with the full trace.
    #[must_use]
    pub fn on_finalize(
        mut self,
        cb: impl FnOnce(&[AcceptanceLogEntry], &str) + Send + 'static,
    ) -> Self {
        self.on_finalize = Some(Box::new(cb));
        self
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &RejectionConfig {
        &self.config
    }

    /// The dimensions this sampler varies.
    #[must_use]
    pub fn filter(&self) -> &[usize] {
        &self.filter
    }
}

impl SearchTask for RejectionSampler {
    type Output = SearchOutcome;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn run(mut self, stop: &StopFlag) -> Result<SearchOutcome> {
        let seeds = self.oracle.positive_examples();
        for seed in &seeds {
            validate_dim(seed, self.x0.len())?;
        }

        let run = AdaptiveRun {
            x0: &self.x0,
            filter: self.filter.clone(),
            seeds: &seeds,
            config: &self.config,
            rng: rng_util::seeded(self.config.seed),
        };
        let oracle = Arc::clone(&self.oracle);
        let (outcome, failure) = run.execute(|x| oracle.evaluate(x), stop, &mut self.on_sample);

        finish(&self.config.name, outcome, failure, self.on_finalize)
    }
}

/// Rejection sampler over an arbitrary scoring function.
///
/// Same algorithm as [`RejectionSampler`], with the filter and seed pool
/// given explicitly.
///
/// ```
/// use explorer::sampler::rejection::{GenericRejectionSampler, RejectionConfig};
/// use explorer::{Prediction, SearchTask, StopFlag, Threshold};
///
/// let seeds = vec![vec![0.5, 0.5, 0.5]];
/// let config = RejectionConfig::default()
///     .threshold(Threshold::below(1.0))
///     .n(3)
///     .seed(11);
/// let sampler = GenericRejectionSampler::new(
///     vec![0.5, 0.5, 0.5],
///     seeds,
///     vec![0, 2],
///     |x: &[f64]| Ok(Prediction::new(x[0] + x[2], 0.0)),
///     config,
/// )
/// .unwrap();
///
/// let outcome = sampler.run(&StopFlag::new()).unwrap();
/// assert!(outcome.samples.iter().all(|s| s.x[1] == 0.5 && s.mean < 1.0));
/// ```
pub struct GenericRejectionSampler<F> {
    x0: Vec<f64>,
    seeds: Vec<Vec<f64>>,
    filter: Vec<usize>,
    score: F,
    config: RejectionConfig,
    on_sample: Option<SampleCallback>,
    on_finalize: Option<FinalizeCallback>,
}

impl<F> GenericRejectionSampler<F>
where
    F: FnMut(&[f64]) -> Result<Prediction> + Send + 'static,
{
    /// Creates a sampler around `x0` with an explicit seed pool and filter.
    ///
    /// `config.filter`, when set, replaces `filter`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptySeedPool`] if `seeds` is empty.
    /// - [`Error::DimensionMismatch`] if a seed's length differs from `x0`'s.
    /// - [`Error::FilterIndexOutOfRange`] if the filter addresses a missing component.
    /// - Threshold and `score_delta` errors as for [`RejectionSampler::new`].
    pub fn new(
        x0: Vec<f64>,
        seeds: Vec<Vec<f64>>,
        filter: Vec<usize>,
        score: F,
        config: RejectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        if seeds.is_empty() {
            return Err(Error::EmptySeedPool);
        }
        for seed in &seeds {
            validate_dim(seed, x0.len())?;
        }
        let filter = config.filter.clone().unwrap_or(filter);
        validate_filter(&filter, x0.len())?;

        Ok(Self {
            x0,
            seeds,
            filter,
            score,
            config,
            on_sample: None,
            on_finalize: None,
        })
    }

    /// Registers a callback fired for each accepted sample.
    #[must_use]
    pub fn on_sample(mut self, cb: impl FnMut(&ScoredPoint) + Send + 'static) -> Self {
        self.on_sample = Some(Box::new(cb));
        self
    }

    /// Registers a callback fired once with the full trace.
    #[must_use]
    pub fn on_finalize(
        mut self,
        cb: impl FnOnce(&[AcceptanceLogEntry], &str) + Send + 'static,
    ) -> Self {
        self.on_finalize = Some(Box::new(cb));
        self
    }
}

impl<F> SearchTask for GenericRejectionSampler<F>
where
    F: FnMut(&[f64]) -> Result<Prediction> + Send + 'static,
{
    type Output = SearchOutcome;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn run(mut self, stop: &StopFlag) -> Result<SearchOutcome> {
        let run = AdaptiveRun {
            x0: &self.x0,
            filter: self.filter.clone(),
            seeds: &self.seeds,
            config: &self.config,
            rng: rng_util::seeded(self.config.seed),
        };
        let (outcome, failure) = run.execute(&mut self.score, stop, &mut self.on_sample);

        finish(&self.config.name, outcome, failure, self.on_finalize)
    }
}
