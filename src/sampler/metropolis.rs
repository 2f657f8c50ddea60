//! Metropolis-style random walk with a diversity filter.
//!
//! Starting from `x0`, each iteration perturbs the active-filter dimensions
//! of the current point with Gaussian noise (variance `scale` per
//! dimension), clamps the result to `[0, 1]` and scores it. The move is
//! taken when a uniform draw falls below the ratio of proposed to current
//! mean score. Once more than `burn` moves have been taken, every
//! `stride`-th move whose score exceeds `q_min` is recorded, provided it
//! lies at least `epsilon` (Euclidean) from every point already recorded.
//!
//! The ratio is deliberately not clamped to 1 and only filter dimensions
//! are perturbed, so this is a score-weighted hill climber rather than a
//! chain with a guaranteed stationary distribution.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `q_min` | 0.6 | Minimum score for a recorded sample |
//! | `epsilon` | 0.1 | Minimum distance between recorded samples |
//! | `n` | 10 | Samples to collect |
//! | `burn` | 100 | Moves discarded before recording starts |
//! | `limit` | 100 000 | Iteration budget |
//! | `stride` | 1 | Record only every `stride`-th move |
//! | `scale` | 0.05 | Per-dimension proposal variance |
//! | `filter` | oracle filter | Dimensions that may vary |
//! | `seed` | random | RNG seed for reproducibility |

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::oracle::ScoreOracle;
use crate::rng_util;
use crate::sampler::common::{clamp_unit, is_diverse, validate_filter};
use crate::task::{FinalizeCallback, SampleCallback, SearchOutcome, SearchTask, StopFlag, finish};
use crate::types::{AcceptanceLogEntry, ScoredPoint};

/// Configuration for [`MetropolisSampler`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetropolisConfig {
    /// Task name used in logs and the finalize callback.
    pub name: String,
    /// Minimum score for a recorded sample.
    pub q_min: f64,
    /// Minimum Euclidean distance between recorded samples.
    pub epsilon: f64,
    /// Samples to collect.
    pub n: usize,
    /// Moves discarded before recording starts.
    pub burn: usize,
    /// Iteration budget.
    pub limit: usize,
    /// Record only every `stride`-th move.
    pub stride: usize,
    /// Per-dimension proposal variance.
    pub scale: f64,
    /// Explicit dimension filter overriding the oracle's.
    pub filter: Option<Vec<usize>>,
    /// RNG seed.
    pub seed: Option<u64>,
}

impl Default for MetropolisConfig {
    fn default() -> Self {
        Self {
            name: "metropolis".to_owned(),
            q_min: 0.6,
            epsilon: 0.1,
            n: 10,
            burn: 100,
            limit: 100_000,
            stride: 1,
            scale: 0.05,
            filter: None,
            seed: None,
        }
    }
}

impl MetropolisConfig {
    /// Sets the task name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the minimum qualifying score.
    #[must_use]
    pub fn q_min(mut self, q_min: f64) -> Self {
        self.q_min = q_min;
        self
    }

    /// Sets the diversity radius.
    #[must_use]
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the number of samples to collect.
    #[must_use]
    pub fn n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// Sets the burn-in length.
    #[must_use]
    pub fn burn(mut self, burn: usize) -> Self {
        self.burn = burn;
        self
    }

    /// Sets the iteration budget.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the thinning stride.
    #[must_use]
    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Sets the proposal variance.
    #[must_use]
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Restricts the walk to an explicit set of dimensions.
    #[must_use]
    pub fn filter(mut self, filter: Vec<usize>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::invalid("stride", "must be at least 1"));
        }
        if self.scale < 0.0 || self.scale.is_nan() {
            return Err(Error::invalid("scale", format!("{} must be non-negative", self.scale)));
        }
        if self.epsilon < 0.0 || self.epsilon.is_nan() {
            return Err(Error::invalid(
                "epsilon",
                format!("{} must be non-negative", self.epsilon),
            ));
        }
        Ok(())
    }
}

/// Ratio of proposed to current mean score.
///
/// Defined as `1.0` when the current score is exactly zero. Not clamped.
///
/// ```
/// use explorer::sampler::metropolis::acceptance_ratio;
///
/// assert_eq!(acceptance_ratio(0.0, 0.3), 1.0);
/// assert_eq!(acceptance_ratio(0.5, 0.25), 0.5);
/// assert_eq!(acceptance_ratio(0.5, 1.0), 2.0);
/// ```
#[must_use]
pub fn acceptance_ratio(current: f64, proposed: f64) -> f64 {
    if current == 0.0 {
        1.0
    } else {
        proposed / current
    }
}

/// Random-walk sampler bound to a [`ScoreOracle`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use explorer::oracle::{FnOracle, TrainingExample};
/// use explorer::sampler::metropolis::{MetropolisConfig, MetropolisSampler};
/// use explorer::{Prediction, SearchTask};
///
/// let examples = vec![
///     TrainingExample::new(vec![0.2, 0.2], 1.0),
///     TrainingExample::new(vec![0.8, 0.8], 0.0),
/// ];
/// let oracle = Arc::new(FnOracle::new(examples, |x: &[f64]| {
///     Prediction::new(1.0 - (x[0] - 0.5).abs(), 0.0)
/// }));
///
/// let config = MetropolisConfig::default()
///     .n(3)
///     .burn(10)
///     .epsilon(0.05)
///     .q_min(0.7)
///     .limit(5_000)
///     .seed(5);
/// let outcome = MetropolisSampler::new(oracle, vec![0.5, 0.5], config)
///     .unwrap()
///     .start()
///     .unwrap()
///     .join()
///     .unwrap();
/// assert!(outcome.samples.iter().all(|s| s.mean > 0.7));
/// ```
pub struct MetropolisSampler {
    oracle: Arc<dyn ScoreOracle>,
    x0: Vec<f64>,
    filter: Vec<usize>,
    config: MetropolisConfig,
    on_sample: Option<SampleCallback>,
    on_finalize: Option<FinalizeCallback>,
}

impl MetropolisSampler {
    /// Creates a sampler starting at `x0`.
    ///
    /// # Errors
    ///
    /// - [`Error::FilterIndexOutOfRange`] if the filter addresses a missing component.
    /// - [`Error::InvalidParameter`] for a zero stride or a negative scale or epsilon.
    pub fn new(
        oracle: Arc<dyn ScoreOracle>,
        x0: Vec<f64>,
        config: MetropolisConfig,
    ) -> Result<Self> {
        config.validate()?;
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

    /// Registers a callback fired for each recorded sample.
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
    pub fn config(&self) -> &MetropolisConfig {
        &self.config
    }

    /// Walks until `n` samples are recorded, the budget runs out or a stop
    /// is requested. Oracle errors end the walk with the outcome so far.
    fn walk(&mut self, stop: &StopFlag) -> (SearchOutcome, Option<Error>) {
        let config = &self.config;
        let mut outcome = SearchOutcome::new(config.n);
        let mut rng = rng_util::seeded(config.seed);
        let step_std = config.scale.sqrt();

        let mut x = self.x0.clone();
        let mut fx = match self.oracle.evaluate(&x) {
            Ok(p) => p,
            Err(err) => return (outcome, Some(err)),
        };

        trace_info!(
            task = config.name.as_str(),
            filter = ?self.filter,
            start_mean = fx.mean,
            "metropolis sampler starting"
        );

        let mut steps = 0usize;
        let mut since_move = 0usize;

        for iteration in 0..config.limit {
            if outcome.samples.len() >= config.n {
                break;
            }
            if stop.is_stop_requested() {
                trace_info!(task = config.name.as_str(), "metropolis sampler early stop");
                outcome.stopped = true;
                break;
            }

            let mut xp = x.clone();
            for &i in &self.filter {
                xp[i] += step_std * rng_util::standard_normal(&mut rng);
            }
            clamp_unit(&mut xp);

            let fxp = match self.oracle.evaluate(&xp) {
                Ok(p) => p,
                Err(err) => return (outcome, Some(err)),
            };

            let a = acceptance_ratio(fx.mean, fxp.mean);
            trace_debug!(iteration, a, mean = fxp.mean, "metropolis proposal");

            let attempt_number = since_move;
            let mut recorded = false;
            if rng.f64() < a {
                steps += 1;
                since_move = 0;

                if steps > config.burn
                    && steps % config.stride == 0
                    && fxp.mean > config.q_min
                    && is_diverse(&xp, &outcome.samples, config.epsilon)
                {
                    let point = ScoredPoint::new(xp.clone(), fxp, steps);
                    trace_info!(
                        task = config.name.as_str(),
                        accepted = outcome.samples.len() + 1,
                        n = config.n,
                        step = steps,
                        mean = fxp.mean,
                        "sample accepted"
                    );
                    if let Some(cb) = self.on_sample.as_mut() {
                        cb(&point);
                    }
                    outcome.samples.push(point);
                    recorded = true;
                }

                x = xp;
                fx = fxp;
            } else {
                since_move += 1;
            }

            outcome.trace.push(AcceptanceLogEntry {
                accepted: recorded,
                score: fxp.mean,
                free_param_count: self.filter.len(),
                attempt_number,
                cumulative_count: iteration + 1,
            });
        }

        (outcome, None)
    }
}

impl SearchTask for MetropolisSampler {
    type Output = SearchOutcome;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn run(mut self, stop: &StopFlag) -> Result<SearchOutcome> {
        let (outcome, failure) = self.walk(stop);
        finish(&self.config.name, outcome, failure, self.on_finalize)
    }
}
