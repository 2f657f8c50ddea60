//! One-dimensional sensitivity sweeps over an oracle.
//!
//! A sweep holds every component of a point fixed except one, which is
//! walked across an evenly spaced grid over `[0, 1]`. The spread and the
//! peak of each sweep tell which dimensions matter and which ones reach
//! the best scores.

use crate::error::{Error, Result};
use crate::oracle::ScoreOracle;
use crate::sampler::common::validate_dim;

/// Grid points per sweep in [`high_impact_params`] and [`best_params`].
pub const DEFAULT_SWEEP_POINTS: usize = 10;

/// Default fraction of the largest effect a dimension must exceed.
pub const DEFAULT_IMPACT_THRESHOLD: f64 = 0.75;

/// Mean scores along dimension `dim` of `x` at `n` evenly spaced values in `[0, 1]`.
///
/// A single-point sweep evaluates at `0.0`.
///
/// # Errors
///
/// - [`Error::FilterIndexOutOfRange`] if `dim` is not a component of `x`.
/// - Oracle failures.
pub fn sweep_1d(oracle: &dyn ScoreOracle, x: &[f64], dim: usize, n: usize) -> Result<Vec<f64>> {
    if dim >= x.len() {
        return Err(Error::FilterIndexOutOfRange { index: dim, dim: x.len() });
    }

    #[allow(clippy::cast_precision_loss)]
    let step = if n > 1 { 1.0 / (n - 1) as f64 } else { 0.0 };
    let points: Vec<Vec<f64>> = (0..n)
        .map(|k| {
            let mut p = x.to_vec();
            #[allow(clippy::cast_precision_loss)]
            let v = k as f64 * step;
            p[dim] = v;
            p
        })
        .collect();

    Ok(oracle
        .evaluate_batch(&points)?
        .into_iter()
        .map(|p| p.mean)
        .collect())
}

/// Sweeps every active dimension of `oracle` around `x`.
fn sweep_active(oracle: &dyn ScoreOracle, x: &[f64]) -> Result<Vec<(usize, Vec<f64>)>> {
    let dim = x.len();
    if let Some(example) = oracle.examples().first() {
        validate_dim(&example.x, dim)?;
    }
    oracle
        .active_filter()
        .into_iter()
        .map(|i| sweep_1d(oracle, x, i, DEFAULT_SWEEP_POINTS).map(|s| (i, s)))
        .collect()
}

fn spread(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}

fn peak(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Active dimensions whose sweep spread exceeds `threshold` times the
/// largest spread.
///
/// Returns nothing when no dimension has any effect.
///
/// # Errors
///
/// Oracle failures, or [`Error::DimensionMismatch`] if `x` does not match
/// the training examples.
///
/// ```
/// use explorer::analysis::high_impact_params;
/// use explorer::oracle::{FnOracle, TrainingExample};
/// use explorer::Prediction;
///
/// let oracle = FnOracle::new(
///     vec![
///         TrainingExample::new(vec![0.0, 0.0, 0.0], 1.0),
///         TrainingExample::new(vec![1.0, 1.0, 1.0], 0.0),
///     ],
///     |x: &[f64]| Prediction::new(2.0 * x[0] + 0.1 * x[1] + 1.8 * x[2], 0.0),
/// );
/// assert_eq!(high_impact_params(&oracle, &[0.5, 0.5, 0.5], 0.75).unwrap(), vec![0, 2]);
/// ```
pub fn high_impact_params(
    oracle: &dyn ScoreOracle,
    x: &[f64],
    threshold: f64,
) -> Result<Vec<usize>> {
    let sweeps = sweep_active(oracle, x)?;
    let spreads: Vec<(usize, f64)> = sweeps.iter().map(|(i, s)| (*i, spread(s))).collect();
    let largest = spreads.iter().map(|&(_, s)| s).fold(0.0, f64::max);
    if largest <= 0.0 {
        return Ok(Vec::new());
    }

    let picked: Vec<usize> = spreads
        .into_iter()
        .filter(|&(_, s)| s > threshold * largest)
        .map(|(i, _)| i)
        .collect();
    trace_debug!(picked = ?picked, largest, "high impact parameters");
    Ok(picked)
}

/// Active dimensions whose sweep reaches above `threshold` times the best
/// score found by any sweep.
///
/// The best score starts at zero, so an oracle that never scores above
/// zero yields no dimensions.
///
/// # Errors
///
/// Same as [`high_impact_params`].
pub fn best_params(oracle: &dyn ScoreOracle, x: &[f64], threshold: f64) -> Result<Vec<usize>> {
    let sweeps = sweep_active(oracle, x)?;
    let peaks: Vec<(usize, f64)> = sweeps.iter().map(|(i, s)| (*i, peak(s))).collect();
    let best = peaks.iter().map(|&(_, p)| p).fold(0.0, f64::max);

    Ok(peaks
        .into_iter()
        .filter(|&(_, p)| p > threshold * best)
        .map(|(i, _)| i)
        .collect())
}
