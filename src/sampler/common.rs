//! Shared helpers used across multiple samplers and the mixer.

use crate::error::{Error, Result};
use crate::types::ScoredPoint;

/// Relative closeness test: `|a - b| <= rel_tol * max(|a|, |b|)`.
///
/// There is no absolute tolerance, so zero is only close to zero.
#[inline]
#[allow(clippy::float_cmp)]
pub(crate) fn is_close(a: f64, b: f64, rel_tol: f64) -> bool {
    a == b || (a - b).abs() <= rel_tol * a.abs().max(b.abs())
}

/// Euclidean distance between two vectors of equal length.
#[inline]
pub(crate) fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Returns `true` if `x` is at least `epsilon` away from every accepted point.
pub(crate) fn is_diverse(x: &[f64], accepted: &[ScoredPoint], epsilon: f64) -> bool {
    accepted.iter().all(|p| l2_distance(x, &p.x) >= epsilon)
}

/// Returns `true` if `score` differs by at least `delta` from every accepted
/// score. A missing or zero delta disables the check.
pub(crate) fn is_score_separated(score: f64, accepted: &[ScoredPoint], delta: Option<f64>) -> bool {
    match delta {
        Some(d) if d > 0.0 => accepted.iter().all(|p| (score - p.mean).abs() >= d),
        _ => true,
    }
}

/// Checks that every filter index addresses a component of a `dim`-vector.
pub(crate) fn validate_filter(filter: &[usize], dim: usize) -> Result<()> {
    match filter.iter().find(|&&i| i >= dim) {
        Some(&index) => Err(Error::FilterIndexOutOfRange { index, dim }),
        None => Ok(()),
    }
}

/// Checks that `x` has `dim` components.
pub(crate) fn validate_dim(x: &[f64], dim: usize) -> Result<()> {
    if x.len() == dim {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            expected: dim,
            got: x.len(),
        })
    }
}

/// Clamps every component into `[0, 1]`.
#[inline]
pub(crate) fn clamp_unit(x: &mut [f64]) {
    for v in x {
        *v = v.clamp(0.0, 1.0);
    }
}
