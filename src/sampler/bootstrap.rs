//! Bayesian-optimization-driven exploration.
//!
//! The bootstrap sampler looks for the points that would teach the oracle
//! the most, one dimension subset at a time.
//!
//! # Algorithm overview
//!
//! 1. **Retrain**: the oracle is retrained over every dimension (with the
//!    configured effort, quick by default).
//! 2. **Incumbent**: the highest predicted mean over the training inputs
//!    becomes the fixed best-observed value for the run.
//! 3. **Frequency table**: every dimension starts at 1 and gains one count
//!    per training example whose `affected` annotation names it (examples
//!    without an annotation count for the oracle's default filter).
//! 4. **Propose**: for a subset of dimensions, a [`LocalMinimizer`]
//!    minimizes the negative Expected Improvement over that subset with the
//!    remaining dimensions frozen at `x0`. The first proposal uses the
//!    default filter; every later one uses a random subset in which
//!    dimension `i` appears with probability `count[i] / (max_count + 1)`.
//!
//! Every proposal is emitted; there is no accept/reject step and therefore
//! no finalize trace.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `n` | 10 | Proposals to emit |
//! | `xi` | 0.01 | Exploration margin subtracted from the improvement |
//! | `restarts` | 5 | Random restarts per local minimization |
//! | `retrain_effort` | `Quick` | Budget for the all-dimension retrain |
//! | `restore_filter` | false | Retrain on the default filter after the run |
//! | `seed` | random | RNG seed for reproducibility |

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::minimize::{LocalMinimizer, PatternSearch};
use crate::oracle::{RetrainEffort, ScoreOracle, TrainingExample};
use crate::rng_util;
use crate::sampler::common::{validate_dim, validate_filter};
use crate::task::{SearchTask, StopFlag};
use crate::types::{Prediction, ScoredPoint};

/// Configuration for [`BootstrapSampler`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BootstrapConfig {
    /// Task name used in logs.
    pub name: String,
    /// Proposals to emit.
    pub n: usize,
    /// Exploration margin.
    pub xi: f64,
    /// Random restarts per local minimization.
    pub restarts: usize,
    /// Budget for the all-dimension retrain.
    pub retrain_effort: RetrainEffort,
    /// Retrain on the default filter after the run.
    pub restore_filter: bool,
    /// RNG seed.
    pub seed: Option<u64>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            name: "bootstrap".to_owned(),
            n: 10,
            xi: 0.01,
            restarts: 5,
            retrain_effort: RetrainEffort::Quick,
            restore_filter: false,
            seed: None,
        }
    }
}

impl BootstrapConfig {
    /// Sets the task name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of proposals.
    #[must_use]
    pub fn n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// Sets the exploration margin.
    #[must_use]
    pub fn xi(mut self, xi: f64) -> Self {
        self.xi = xi;
        self
    }

    /// Sets the restarts per minimization.
    #[must_use]
    pub fn restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    /// Sets the retrain budget.
    #[must_use]
    pub fn retrain_effort(mut self, effort: RetrainEffort) -> Self {
        self.retrain_effort = effort;
        self
    }

    /// Retrain on the default filter once the run ends.
    #[must_use]
    pub fn restore_filter(mut self, restore: bool) -> Self {
        self.restore_filter = restore;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A bootstrap proposal and the dimensions it was optimized over.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BootstrapSample {
    /// The proposed point and its prediction.
    pub point: ScoredPoint,
    /// The dimension subset that was optimized.
    pub affected: Vec<usize>,
}

/// Called once per emitted proposal.
pub type BootstrapCallback = Box<dyn FnMut(&BootstrapSample) + Send>;

/// Per-dimension usage counts from the training set.
///
/// Every count is at least 1, so every dimension can be selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: Vec<usize>,
    max: usize,
}

impl FrequencyTable {
    /// Counts dimension usage across `examples` for `dim`-dimensional vectors.
    ///
    /// Annotation indices outside `0..dim` are ignored.
    #[must_use]
    pub fn from_examples(
        examples: &[TrainingExample],
        dim: usize,
        default_filter: &[usize],
    ) -> Self {
        let mut counts = vec![1usize; dim];
        for example in examples {
            let used = if example.affected.is_empty() {
                default_filter
            } else {
                &example.affected
            };
            for &i in used {
                if let Some(c) = counts.get_mut(i) {
                    *c += 1;
                }
            }
        }
        let max = counts.iter().copied().max().unwrap_or(1);
        Self { counts, max }
    }

    /// The count for each dimension.
    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// The largest count.
    #[must_use]
    pub fn max_count(&self) -> usize {
        self.max
    }

    /// Probability that dimension `i` joins a random subset.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn selection_probability(&self, i: usize) -> f64 {
        self.counts.get(i).map_or(0.0, |&c| c as f64 / (self.max + 1) as f64)
    }

    /// Draws a random subset, each dimension independently.
    pub fn select(&self, rng: &mut fastrand::Rng) -> Vec<usize> {
        (0..self.counts.len())
            .filter(|&i| rng_util::bernoulli(rng, self.selection_probability(i)))
            .collect()
    }
}

/// Standard normal PDF.
fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Abramowitz-Stegun 26.2.17).
fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let t = 1.0 / (1.0 + 0.231_641_9 * x.abs());
    let inner = -1.821_255_978 + t * 1.330_274_429;
    let poly = t * (0.319_381_530 + t * (-0.356_563_782 + t * (1.781_477_937 + t * inner)));
    let upper = norm_pdf(x.abs()) * poly;

    if x >= 0.0 { 1.0 - upper } else { upper }
}

/// Expected Improvement of a prediction over `best` for a maximization problem.
///
/// `EI = imp Φ(z) + σ φ(z)` with `imp = mean - best - xi` and `z = imp / σ`.
/// The oracle's variance is used as `σ` as is, without a square root, so
/// the acquisition surface stays in the oracle's own units. Zero when the
/// variance is zero or negative.
///
/// ```
/// use explorer::sampler::bootstrap::expected_improvement;
/// use explorer::Prediction;
///
/// assert_eq!(expected_improvement(Prediction::new(2.0, 0.0), 1.0, 0.01), 0.0);
/// let wide = expected_improvement(Prediction::new(1.0, 1.0), 1.0, 0.0);
/// let narrow = expected_improvement(Prediction::new(1.0, 0.01), 1.0, 0.0);
/// assert!(wide > narrow);
/// ```
#[must_use]
pub fn expected_improvement(prediction: Prediction, best: f64, xi: f64) -> f64 {
    let sigma = prediction.variance;
    if sigma <= 0.0 {
        return 0.0;
    }
    let improvement = prediction.mean - best - xi;
    let z = improvement / sigma;
    improvement * norm_cdf(z) + sigma * norm_pdf(z)
}

/// Copies `values` into the `subset` dimensions of `base`.
fn unfilter(base: &[f64], subset: &[usize], values: &[f64]) -> Vec<f64> {
    let mut x = base.to_vec();
    for (&i, &v) in subset.iter().zip(values) {
        x[i] = v;
    }
    x
}

/// Exploration sampler driven by Expected Improvement.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use explorer::oracle::{FnOracle, TrainingExample};
/// use explorer::sampler::bootstrap::{BootstrapConfig, BootstrapSampler};
/// use explorer::{Prediction, SearchTask, StopFlag};
///
/// let examples = vec![
///     TrainingExample::new(vec![0.2, 0.4, 0.6], 1.0),
///     TrainingExample::with_affected(vec![0.3, 0.4, 0.9], 0.5, vec![0, 2]),
/// ];
/// let oracle = Arc::new(FnOracle::new(examples, |x: &[f64]| {
///     Prediction::new(x[0] * x[2], 0.05 + 0.1 * x[1])
/// }));
///
/// let config = BootstrapConfig::default().n(3).restarts(2).seed(1);
/// let samples = BootstrapSampler::new(oracle, vec![0.2, 0.4, 0.6], config)
///     .unwrap()
///     .run(&StopFlag::new())
///     .unwrap();
///
/// assert_eq!(samples.len(), 3);
/// assert_eq!(samples[0].affected, vec![0, 2]);
/// ```
pub struct BootstrapSampler {
    oracle: Arc<dyn ScoreOracle>,
    x0: Vec<f64>,
    config: BootstrapConfig,
    minimizer: Arc<dyn LocalMinimizer>,
    on_sample: Option<BootstrapCallback>,
}

impl BootstrapSampler {
    /// Creates a sampler around `x0` using [`PatternSearch`] for the
    /// acquisition minimization.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyTrainingSet`] if the oracle has no examples.
    /// - [`Error::DimensionMismatch`] if an example's length differs from `x0`'s.
    /// - [`Error::InvalidParameter`] for zero restarts.
    pub fn new(
        oracle: Arc<dyn ScoreOracle>,
        x0: Vec<f64>,
        config: BootstrapConfig,
    ) -> Result<Self> {
        if config.restarts == 0 {
            return Err(Error::invalid("restarts", "must be at least 1"));
        }
        let examples = oracle.examples();
        if examples.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        for example in &examples {
            validate_dim(&example.x, x0.len())?;
        }

        Ok(Self {
            oracle,
            x0,
            config,
            minimizer: Arc::new(PatternSearch::default()),
            on_sample: None,
        })
    }

    /// Replaces the local minimizer.
    #[must_use]
    pub fn with_minimizer(mut self, minimizer: Arc<dyn LocalMinimizer>) -> Self {
        self.minimizer = minimizer;
        self
    }

    /// Registers a callback fired for each emitted proposal.
    #[must_use]
    pub fn on_sample(mut self, cb: impl FnMut(&BootstrapSample) + Send + 'static) -> Self {
        self.on_sample = Some(Box::new(cb));
        self
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Highest predicted mean over the training inputs.
    fn best_observed(&self, examples: &[TrainingExample]) -> Result<f64> {
        let xs: Vec<Vec<f64>> = examples.iter().map(|e| e.x.clone()).collect();
        let predictions = self.oracle.evaluate_batch(&xs)?;
        Ok(predictions
            .iter()
            .map(|p| p.mean)
            .fold(f64::NEG_INFINITY, f64::max))
    }

    /// Maximizes Expected Improvement over `subset` and scores the result.
    fn propose(
        &self,
        subset: &[usize],
        best: f64,
        rng: &mut fastrand::Rng,
    ) -> Result<(Vec<f64>, Prediction)> {
        let oracle = &self.oracle;
        let x0 = &self.x0;
        let xi = self.config.xi;
        let mut objective = |z: &[f64]| -> Result<f64> {
            let prediction = oracle.evaluate(&unfilter(x0, subset, z))?;
            Ok(-expected_improvement(prediction, best, xi))
        };

        let minimum = self
            .minimizer
            .minimize(&mut objective, subset.len(), self.config.restarts, rng)?;
        trace_debug!(improvement = -minimum.value, "acquisition maximized");

        let x = unfilter(x0, subset, &minimum.x);
        let prediction = self.oracle.evaluate(&x)?;
        Ok((x, prediction))
    }

    fn explore(&mut self, stop: &StopFlag) -> Result<Vec<BootstrapSample>> {
        let dim = self.x0.len();
        let all: Vec<usize> = (0..dim).collect();

        trace_info!(task = self.config.name.as_str(), "retraining oracle on all parameters");
        self.oracle.retrain(Some(&all), self.config.retrain_effort)?;

        let examples = self.oracle.examples();
        if examples.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        let best = self.best_observed(&examples)?;
        trace_info!(best, "maximum training mean found");

        let default_filter = self.oracle.default_filter();
        validate_filter(&default_filter, dim)?;
        let table = FrequencyTable::from_examples(&examples, dim, &default_filter);
        trace_info!(
            counts = ?table.counts(),
            max = table.max_count(),
            "frequency table initialized"
        );

        let mut rng = rng_util::seeded(self.config.seed);
        let mut samples = Vec::with_capacity(self.config.n);

        while samples.len() < self.config.n {
            if stop.is_stop_requested() {
                trace_info!(task = self.config.name.as_str(), "bootstrap sampler early stop");
                break;
            }

            let subset = if samples.is_empty() {
                default_filter.clone()
            } else {
                table.select(&mut rng)
            };
            let (x, prediction) = self.propose(&subset, best, &mut rng)?;

            let sample = BootstrapSample {
                point: ScoredPoint::new(x, prediction, samples.len()),
                affected: subset,
            };
            trace_info!(
                index = sample.point.index,
                n = self.config.n,
                mean = sample.point.mean,
                variance = sample.point.variance,
                affected = ?sample.affected,
                "proposal emitted"
            );
            if let Some(cb) = self.on_sample.as_mut() {
                cb(&sample);
            }
            samples.push(sample);
        }

        Ok(samples)
    }
}

impl SearchTask for BootstrapSampler {
    type Output = Vec<BootstrapSample>;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn run(mut self, stop: &StopFlag) -> Result<Vec<BootstrapSample>> {
        let result = self.explore(stop);
        if self.config.restore_filter {
            // The run's own result wins over a failed restore.
            if let Err(_err) = self.oracle.retrain(None, RetrainEffort::Full) {
                trace_info!(error = %_err, "default filter restore failed");
            }
        }
        result
    }
}
