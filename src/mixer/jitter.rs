//! Small random perturbations around a point.

use crate::error::{Error, Result};
use crate::oracle::ScoreOracle;
use crate::rng_util;
use crate::sampler::common::validate_filter;
use crate::types::ScoredPoint;

/// Returns `n` copies of `x0`, each affected dimension moved by
/// `U(-1, 1) * delta` and clamped to `[0, 1]`.
///
/// `affected` defaults to every dimension.
///
/// # Errors
///
/// - [`Error::InvalidParameter`] for a negative or NaN `delta`.
/// - [`Error::FilterIndexOutOfRange`] if `affected` addresses a missing component.
///
/// # Examples
///
/// ```
/// use explorer::mixer::jitter;
///
/// let mut rng = fastrand::Rng::with_seed(8);
/// let points = jitter(&[0.5, 0.0, 1.0], 0.1, Some(&[0, 2]), 5, &mut rng).unwrap();
///
/// assert_eq!(points.len(), 5);
/// for x in &points {
///     assert!((x[0] - 0.5).abs() <= 0.1);
///     assert_eq!(x[1], 0.0);
///     assert!(x[2] <= 1.0);
/// }
/// ```
pub fn jitter(
    x0: &[f64],
    delta: f64,
    affected: Option<&[usize]>,
    n: usize,
    rng: &mut fastrand::Rng,
) -> Result<Vec<Vec<f64>>> {
    if delta < 0.0 || delta.is_nan() {
        return Err(Error::invalid("delta", format!("{delta} must be non-negative")));
    }
    let all: Vec<usize>;
    let dims = if let Some(dims) = affected {
        validate_filter(dims, x0.len())?;
        dims
    } else {
        all = (0..x0.len()).collect();
        &all
    };

    Ok((0..n)
        .map(|_| {
            let mut x = x0.to_vec();
            for &i in dims {
                x[i] = (x[i] + rng_util::f64_range(rng, -1.0, 1.0) * delta).clamp(0.0, 1.0);
            }
            x
        })
        .collect())
}

/// [`jitter`], with every point scored by `oracle`.
///
/// # Errors
///
/// Same as [`jitter`], plus oracle failures.
pub fn jitter_scored(
    oracle: &dyn ScoreOracle,
    x0: &[f64],
    delta: f64,
    affected: Option<&[usize]>,
    n: usize,
    rng: &mut fastrand::Rng,
) -> Result<Vec<ScoredPoint>> {
    let points = jitter(x0, delta, affected, n, rng)?;
    let predictions = oracle.evaluate_batch(&points)?;
    Ok(points
        .into_iter()
        .zip(predictions)
        .enumerate()
        .map(|(index, (x, p))| ScoredPoint::new(x, p, index))
        .collect())
}
