//! Multi-objective sample migration across several oracles.
//!
//! A point travels from oracle to oracle. At each stop a rejection search
//! against the new oracle proposes a candidate that beats the current point
//! under that oracle, and the move is accepted with a Metropolis-like ratio
//! of summed scores over every oracle visited so far. Oracles with smaller
//! active filters are visited first, so the point is shaped by the most
//! constrained opinions before the broadest ones.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `n` | 10 | Traversals, one final point each |
//! | `search` | rejection defaults, limit 1000 | Settings for the per-oracle rejection search |
//! | `seed` | random | RNG seed for reproducibility |

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::oracle::ScoreOracle;
use crate::rng_util;
use crate::sampler::rejection::{RejectionConfig, RejectionSampler};
use crate::task::{SearchTask, StopFlag};
use crate::types::Threshold;

/// Default proposal budget for each per-oracle rejection search.
const DEFAULT_SEARCH_LIMIT: usize = 1000;

/// Settings for [`migrate`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MigrationConfig {
    /// Number of traversals.
    pub n: usize,
    /// Rejection settings for each hop. `threshold`, `n`, `filter` and
    /// `seed` are replaced per hop.
    pub search: RejectionConfig,
    /// RNG seed.
    pub seed: Option<u64>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            n: 10,
            search: RejectionConfig::default()
                .name("migration")
                .limit(Some(DEFAULT_SEARCH_LIMIT)),
            seed: None,
        }
    }
}

impl MigrationConfig {
    /// Sets the number of traversals.
    #[must_use]
    pub fn n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// Sets the per-hop rejection settings.
    #[must_use]
    pub fn search(mut self, search: RejectionConfig) -> Self {
        self.search = search;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// The end point of one traversal.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MigratedPoint {
    /// Final location.
    pub x: Vec<f64>,
    /// Sum of every oracle's mean score at `x`.
    pub score: f64,
    /// Traversal number.
    pub index: usize,
}

/// Visiting order: ascending active-filter size, ties in random order.
fn traversal_order(filter_sizes: &[usize], rng: &mut fastrand::Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..filter_sizes.len()).collect();
    rng.shuffle(&mut order);
    order.sort_by_key(|&i| filter_sizes[i]);
    order
}

fn summed_score(oracles: &[Arc<dyn ScoreOracle>], visited: &[usize], x: &[f64]) -> Result<f64> {
    visited
        .iter()
        .map(|&i| oracles[i].evaluate(x).map(|p| p.mean))
        .sum()
}

/// Move acceptance probability; `1.0` when the current sum is zero.
fn migration_ratio(current: f64, candidate: f64) -> f64 {
    if current == 0.0 { 1.0 } else { candidate / current }
}

/// Walks `base` across `oracles` `config.n` times.
///
/// # Errors
///
/// - [`Error::InvalidParameter`] if `oracles` is empty.
/// - Any construction or oracle error from a hop's rejection search.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use explorer::mixer::{MigrationConfig, migrate};
/// use explorer::oracle::{FnOracle, ScoreOracle, TrainingExample};
/// use explorer::Prediction;
///
/// let examples = vec![
///     TrainingExample::new(vec![0.2, 0.8], 1.0),
///     TrainingExample::new(vec![0.6, 0.3], 0.4),
/// ];
/// let left: Arc<dyn ScoreOracle> =
///     Arc::new(FnOracle::new(examples.clone(), |x: &[f64]| Prediction::new(x[0], 0.0)));
/// let right: Arc<dyn ScoreOracle> =
///     Arc::new(FnOracle::new(examples, |x: &[f64]| Prediction::new(x[1], 0.0)));
///
/// let config = MigrationConfig::default().n(3).seed(2);
/// let points = migrate(&[0.5, 0.5], &[left, right], &config).unwrap();
/// assert_eq!(points.len(), 3);
/// assert!(points.iter().all(|p| p.x.iter().all(|v| (0.0..=1.0).contains(v))));
/// ```
pub fn migrate(
    base: &[f64],
    oracles: &[Arc<dyn ScoreOracle>],
    config: &MigrationConfig,
) -> Result<Vec<MigratedPoint>> {
    if oracles.is_empty() {
        return Err(Error::invalid("oracles", "at least one oracle is required"));
    }

    let mut rng = rng_util::seeded(config.seed);
    let filter_sizes: Vec<usize> = oracles.iter().map(|o| o.active_filter().len()).collect();
    let everyone: Vec<usize> = (0..oracles.len()).collect();
    let stop = StopFlag::new();
    let mut points = Vec::with_capacity(config.n);

    for index in 0..config.n {
        let order = traversal_order(&filter_sizes, &mut rng);
        trace_debug!(index, order = ?order, "migration traversal");

        let mut current = base.to_vec();
        let mut visited = vec![order[0]];

        for &next in &order[1..] {
            let oracle = &oracles[next];
            let hurdle = oracle.evaluate(&current)?.mean;

            let mut search = config.search.clone();
            search.threshold = Threshold::above(hurdle);
            search.n = 1;
            search.filter = None;
            search.seed = Some(rng.u64(..));

            let outcome =
                RejectionSampler::new(Arc::clone(oracle), current.clone(), search)?.run(&stop)?;
            visited.push(next);
            // One draw per transition, whether or not the search found a candidate.
            let u = rng.f64();

            let Some(candidate) = outcome.samples.into_iter().next() else {
                trace_debug!(oracle = next, "no candidate beat the current point");
                continue;
            };

            let current_sum = summed_score(oracles, &visited, &current)?;
            let candidate_sum = summed_score(oracles, &visited, &candidate.x)?;
            if u < migration_ratio(current_sum, candidate_sum) {
                current = candidate.x;
            }
        }

        let score = summed_score(oracles, &everyone, &current)?;
        trace_info!(index, score, "migration traversal finished");
        points.push(MigratedPoint {
            x: current,
            score,
            index,
        });
    }

    Ok(points)
}
