//! The [`ScoreOracle`] trait defines the scoring model the samplers explore.
//!
//! The oracle is an external collaborator: typically a regression model
//! trained on user-rated examples that returns a mean score and a variance
//! for any vector in `[0, 1]^n`. The samplers only call it; they never build
//! or train it themselves (the bootstrap sampler's retrain request is the
//! single exception, and the oracle decides what retraining means).
//!
//! For scorers that are plain functions, [`FnOracle`] wraps a closure and
//! a list of training examples:
//!
//! ```
//! use explorer::oracle::{FnOracle, ScoreOracle, TrainingExample};
//! use explorer::Prediction;
//!
//! let examples = vec![
//!     TrainingExample::new(vec![0.2, 0.5, 0.1], 1.0),
//!     TrainingExample::new(vec![0.8, 0.5, 0.3], 0.0),
//! ];
//! let oracle = FnOracle::new(examples, |x: &[f64]| Prediction::new(x[0], 0.01));
//!
//! // Dimension 1 never varies across the examples.
//! assert_eq!(oracle.active_filter(), vec![0, 2]);
//! assert_eq!(oracle.positive_examples(), vec![vec![0.2, 0.5, 0.1]]);
//! ```

use core::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sampler::common::is_close;
use crate::types::Prediction;

/// Relative tolerance below which a dimension counts as constant across
/// the training set.
pub const FILTER_REL_TOL: f64 = 1e-5;

/// A stored training example.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainingExample {
    /// The example vector.
    pub x: Vec<f64>,
    /// The user-assigned score.
    pub score: f64,
    /// Dimensions this example was generated by varying. Empty when the
    /// example carries no annotation.
    #[cfg_attr(feature = "serde", serde(default))]
    pub affected: Vec<usize>,
}

impl TrainingExample {
    /// Creates an unannotated example.
    #[must_use]
    pub fn new(x: Vec<f64>, score: f64) -> Self {
        Self {
            x,
            score,
            affected: Vec::new(),
        }
    }

    /// Creates an example annotated with the dimensions that produced it.
    #[must_use]
    pub fn with_affected(x: Vec<f64>, score: f64, affected: Vec<usize>) -> Self {
        Self { x, score, affected }
    }
}

/// How much effort a retrain request may spend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RetrainEffort {
    /// The oracle's normal training budget.
    #[default]
    Full,
    /// An abbreviated budget for interactive use.
    Quick,
}

/// The scoring model consumed by every sampler.
///
/// Implementations must be `Send + Sync` because a running search task
/// holds the oracle on its worker thread. The driver is responsible for
/// keeping at most one task active against a given oracle.
pub trait ScoreOracle: Send + Sync {
    /// Predict the score at `x`.
    ///
    /// # Errors
    ///
    /// Implementations report model failures as [`Error::Oracle`](crate::Error::Oracle).
    fn evaluate(&self, x: &[f64]) -> Result<Prediction>;

    /// Predict scores for several points.
    ///
    /// # Errors
    ///
    /// Fails if any single evaluation fails.
    fn evaluate_batch(&self, xs: &[Vec<f64>]) -> Result<Vec<Prediction>> {
        xs.iter().map(|x| self.evaluate(x)).collect()
    }

    /// The dimensions the model currently treats as free.
    fn active_filter(&self) -> Vec<usize>;

    /// The stored training examples.
    fn examples(&self) -> Vec<TrainingExample>;

    /// Training vectors with a positive score.
    fn positive_examples(&self) -> Vec<Vec<f64>> {
        positive_examples(&self.examples())
    }

    /// The filter derived from the training set, ignoring any override.
    fn default_filter(&self) -> Vec<usize> {
        default_filter(&self.examples())
    }

    /// Retrain the model, optionally over an explicit set of dimensions.
    ///
    /// `None` restores the default filter.
    ///
    /// # Errors
    ///
    /// Implementations report training failures as [`Error::Oracle`](crate::Error::Oracle).
    fn retrain(&self, filter: Option<&[usize]>, effort: RetrainEffort) -> Result<()>;
}

/// Dimensions whose values are not all close to the first example's value.
///
/// Returns an empty filter for an empty training set.
#[must_use]
pub fn default_filter(examples: &[TrainingExample]) -> Vec<usize> {
    let Some(first) = examples.first() else {
        return Vec::new();
    };

    (0..first.x.len())
        .filter(|&i| {
            let p0 = first.x[i];
            !examples
                .iter()
                .all(|e| e.x.get(i).is_some_and(|&v| is_close(v, p0, FILTER_REL_TOL)))
        })
        .collect()
}

/// Vectors of the examples scored above zero.
#[must_use]
pub fn positive_examples(examples: &[TrainingExample]) -> Vec<Vec<f64>> {
    examples
        .iter()
        .filter(|e| e.score > 0.0)
        .map(|e| e.x.clone())
        .collect()
}

/// A [`ScoreOracle`] backed by a closure.
///
/// The active filter starts as the filter derived from the examples;
/// [`retrain`](ScoreOracle::retrain) with an explicit filter installs it,
/// and `retrain(None, _)` restores the derived one. The closure itself is
/// never changed by retraining.
pub struct FnOracle<F> {
    score: F,
    examples: Vec<TrainingExample>,
    filter: RwLock<Vec<usize>>,
    retrains: AtomicUsize,
}

impl<F> FnOracle<F>
where
    F: Fn(&[f64]) -> Prediction + Send + Sync,
{
    /// Creates an oracle from training examples and a scoring closure.
    pub fn new(examples: Vec<TrainingExample>, score: F) -> Self {
        let filter = default_filter(&examples);
        Self {
            score,
            examples,
            filter: RwLock::new(filter),
            retrains: AtomicUsize::new(0),
        }
    }

    /// Replaces the active filter.
    #[must_use]
    pub fn with_filter(self, filter: Vec<usize>) -> Self {
        *self.filter.write() = filter;
        self
    }

    /// Number of retrain requests received so far.
    #[must_use]
    pub fn retrain_count(&self) -> usize {
        self.retrains.load(Ordering::Relaxed)
    }
}

impl<F> ScoreOracle for FnOracle<F>
where
    F: Fn(&[f64]) -> Prediction + Send + Sync,
{
    fn evaluate(&self, x: &[f64]) -> Result<Prediction> {
        Ok((self.score)(x))
    }

    fn active_filter(&self) -> Vec<usize> {
        self.filter.read().clone()
    }

    fn examples(&self) -> Vec<TrainingExample> {
        self.examples.clone()
    }

    fn retrain(&self, filter: Option<&[usize]>, _effort: RetrainEffort) -> Result<()> {
        let next = filter.map_or_else(|| default_filter(&self.examples), <[usize]>::to_vec);
        *self.filter.write() = next;
        self.retrains.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
