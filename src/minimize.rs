//! Bounded local minimization over the unit hypercube.
//!
//! The bootstrap sampler needs "the best point a local optimizer can find
//! from a few random starts". That capability is injected through
//! [`LocalMinimizer`]; [`PatternSearch`] is the default, a derivative-free
//! compass search restarted from uniform random points.

use crate::error::{Error, Result};

/// The best point found by a minimizer.
#[derive(Clone, Debug, PartialEq)]
pub struct Minimum {
    /// Location of the minimum, inside `[0, 1]^dim`.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub value: f64,
}

/// Objective callback handed to a [`LocalMinimizer`].
pub type Objective<'a> = dyn FnMut(&[f64]) -> Result<f64> + 'a;

/// Multi-restart minimization over `[0, 1]^dim`.
pub trait LocalMinimizer: Send + Sync {
    /// Minimizes `objective` from `restarts` random starting points and
    /// returns the best result.
    ///
    /// # Errors
    ///
    /// Propagates objective errors. Implementations may return
    /// [`Error::Minimizer`] when no finite value is found.
    fn minimize(
        &self,
        objective: &mut Objective<'_>,
        dim: usize,
        restarts: usize,
        rng: &mut fastrand::Rng,
    ) -> Result<Minimum>;
}

/// Compass search with step halving, restarted from random points.
///
/// Each restart polls `x ± step` along every coordinate, moves to the
/// first improvement, and halves the step when no coordinate improves.
/// A restart ends when the step falls below `min_step` or its evaluation
/// budget is spent.
#[derive(Clone, Debug)]
pub struct PatternSearch {
    /// Initial poll step.
    pub initial_step: f64,
    /// Step below which a restart ends.
    pub min_step: f64,
    /// Objective evaluations allowed per restart.
    pub max_evals: usize,
}

impl Default for PatternSearch {
    fn default() -> Self {
        Self {
            initial_step: 0.25,
            min_step: 1e-3,
            max_evals: 500,
        }
    }
}

impl PatternSearch {
    fn descend(&self, objective: &mut Objective<'_>, start: Vec<f64>) -> Result<Minimum> {
        let mut x = start;
        let mut fx = objective(&x)?;
        let mut evals = 1;
        let mut step = self.initial_step;

        'outer: while step >= self.min_step && evals < self.max_evals {
            for d in 0..x.len() {
                for sign in [1.0, -1.0] {
                    let moved = (x[d] + sign * step).clamp(0.0, 1.0);
                    // Pinned against a bound
                    #[allow(clippy::float_cmp)]
                    if moved == x[d] {
                        continue;
                    }
                    let mut y = x.clone();
                    y[d] = moved;
                    let fy = objective(&y)?;
                    evals += 1;
                    if fy < fx {
                        x = y;
                        fx = fy;
                        continue 'outer;
                    }
                    if evals >= self.max_evals {
                        break 'outer;
                    }
                }
            }
            step *= 0.5;
        }

        Ok(Minimum { x, value: fx })
    }
}

impl LocalMinimizer for PatternSearch {
    fn minimize(
        &self,
        objective: &mut Objective<'_>,
        dim: usize,
        restarts: usize,
        rng: &mut fastrand::Rng,
    ) -> Result<Minimum> {
        if dim == 0 {
            let value = objective(&[])?;
            return Ok(Minimum { x: Vec::new(), value });
        }

        let mut best: Option<Minimum> = None;
        for _ in 0..restarts.max(1) {
            let start: Vec<f64> = (0..dim).map(|_| rng.f64()).collect();
            let candidate = self.descend(objective, start)?;
            if !candidate.value.is_nan()
                && best.as_ref().is_none_or(|b| candidate.value < b.value)
            {
                best = Some(candidate);
            }
        }

        best.ok_or_else(|| Error::Minimizer("objective returned only NaN".to_owned()))
    }
}
