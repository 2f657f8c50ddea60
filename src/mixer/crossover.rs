//! Crossover recombination of two parent vectors.
//!
//! Only the dimensions where the parents differ take part. Each hybrid is
//! described by a generator: one bit per active dimension, `true` taking
//! the value from `b` and `false` from `a`. Generators are unique within a
//! single call, so no two hybrids share a bit pattern.

use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rng_util;
use crate::sampler::common::{is_close, validate_dim};

/// Relative tolerance below which two parent values count as equal.
pub const ACTIVE_REL_TOL: f64 = 1e-3;

/// Settings for [`mix`].
///
/// | Option | Default | Description |
/// |--------|---------|-------------|
/// | `count` | 10 | Maximum hybrids to return |
/// | `bias` | 0.5 | Probability that an active dimension takes `b`'s value |
/// | `attempts` | 100 | Generator draws before giving up |
/// | `seed` | random | RNG seed for reproducibility |
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MixConfig {
    /// Maximum hybrids to return.
    pub count: usize,
    /// Probability of taking `b`'s value per active dimension.
    pub bias: f64,
    /// Generator draws before giving up.
    pub attempts: usize,
    /// RNG seed.
    pub seed: Option<u64>,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            count: 10,
            bias: 0.5,
            attempts: 100,
            seed: None,
        }
    }
}

impl MixConfig {
    /// Sets the maximum number of hybrids.
    #[must_use]
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets the bias toward `b`.
    #[must_use]
    pub fn bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    /// Sets the number of generator draws.
    #[must_use]
    pub fn attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// One hybrid and the generator that produced it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MixResult {
    /// One bit per active dimension; `true` took `b`'s value.
    pub generator: Vec<bool>,
    /// The hybrid vector.
    pub x: Vec<f64>,
}

/// Everything a [`mix`] call produced.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MixOutcome {
    /// Unique hybrids in the order they were drawn.
    pub results: Vec<MixResult>,
    /// Dimensions where the parents differ.
    pub active: Vec<usize>,
}

impl MixOutcome {
    /// Number of hybrids produced.
    #[must_use]
    pub fn count(&self) -> usize {
        self.results.len()
    }

    /// Iterates over the hybrid vectors.
    pub fn vectors(&self) -> impl Iterator<Item = &[f64]> {
        self.results.iter().map(|r| r.x.as_slice())
    }
}

/// Dimensions where `a` and `b` are not close.
#[must_use]
pub fn active_dimensions(a: &[f64], b: &[f64]) -> Vec<usize> {
    a.iter()
        .zip(b)
        .enumerate()
        .filter(|&(_, (&x, &y))| !is_close(x, y, ACTIVE_REL_TOL))
        .map(|(i, _)| i)
        .collect()
}

/// Recombines `a` and `b` into at most `config.count` unique hybrids.
///
/// Identical parents yield an empty outcome without drawing anything.
///
/// # Errors
///
/// - [`Error::DimensionMismatch`] if the parents differ in length.
/// - [`Error::InvalidParameter`] if `bias` is outside `[0, 1]`.
///
/// # Examples
///
/// ```
/// use explorer::mixer::{MixConfig, mix};
///
/// let a = [0.0, 0.0, 0.0, 0.0];
/// let b = [1.0, 1.0, 1.0, 1.0];
/// let outcome = mix(&a, &b, &MixConfig::default().count(4).attempts(50).seed(3)).unwrap();
///
/// assert_eq!(outcome.active, vec![0, 1, 2, 3]);
/// assert!(outcome.count() <= 4);
/// ```
pub fn mix(a: &[f64], b: &[f64], config: &MixConfig) -> Result<MixOutcome> {
    let mut rng = rng_util::seeded(config.seed);
    mix_with_rng(a, b, config.count, config.bias, config.attempts, &mut rng)
}

/// [`mix`] with explicit arguments and a caller-owned RNG.
///
/// # Errors
///
/// Same as [`mix`].
pub fn mix_with_rng(
    a: &[f64],
    b: &[f64],
    count: usize,
    bias: f64,
    attempts: usize,
    rng: &mut fastrand::Rng,
) -> Result<MixOutcome> {
    validate_dim(b, a.len())?;
    if !(0.0..=1.0).contains(&bias) {
        return Err(Error::invalid("bias", format!("{bias} is outside [0, 1]")));
    }

    let active = active_dimensions(a, b);
    if active.is_empty() {
        trace_debug!("parents are identical, nothing to mix");
        return Ok(MixOutcome::default());
    }

    let mut seen: HashSet<Vec<bool>> = HashSet::new();
    let mut results = Vec::new();

    for _ in 0..attempts {
        if results.len() >= count {
            break;
        }
        let generator: Vec<bool> = active
            .iter()
            .map(|_| rng_util::bernoulli(rng, bias))
            .collect();
        if seen.contains(&generator) {
            continue;
        }

        let mut x = a.to_vec();
        for (&i, &take_b) in active.iter().zip(&generator) {
            if take_b {
                x[i] = b[i];
            }
        }
        seen.insert(generator.clone());
        results.push(MixResult { generator, x });
    }

    trace_debug!(
        active = active.len(),
        produced = results.len(),
        requested = count,
        "mix finished"
    );

    Ok(MixOutcome { results, active })
}
