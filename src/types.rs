//! Core value types shared by the samplers and the mixer.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An oracle prediction at a single point.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Prediction {
    /// Predicted mean score.
    pub mean: f64,
    /// Predictive variance.
    pub variance: f64,
}

impl Prediction {
    /// Creates a prediction from a mean and a variance.
    #[must_use]
    pub fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }
}

/// A scored vector produced during a run.
///
/// `index` is the sequence number of the sample within its run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoredPoint {
    /// The scored vector.
    pub x: Vec<f64>,
    /// Predicted mean score at `x`.
    pub mean: f64,
    /// Predictive variance at `x`.
    pub variance: f64,
    /// Sequence number within the run.
    pub index: usize,
}

impl ScoredPoint {
    /// Creates a scored point from a vector and its prediction.
    #[must_use]
    pub fn new(x: Vec<f64>, prediction: Prediction, index: usize) -> Self {
        Self {
            x,
            mean: prediction.mean,
            variance: prediction.variance,
            index,
        }
    }
}

/// One proposal in a run's diagnostic trace.
///
/// The trace is handed to the finalize callback and never feeds back
/// into the run.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AcceptanceLogEntry {
    /// Whether the proposal was recorded as a sample.
    pub accepted: bool,
    /// Mean score of the proposal.
    pub score: f64,
    /// Number of free parameters in effect for the proposal.
    pub free_param_count: usize,
    /// Consecutive-attempt counter at the time of the proposal.
    pub attempt_number: usize,
    /// Total proposals made so far in the run, this one included.
    pub cumulative_count: usize,
}

/// How a rejection sampler compares a score against its threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum ThresholdMode {
    /// Accept scores strictly above the threshold.
    #[default]
    Gt,
    /// Accept scores strictly below the threshold.
    Lt,
    /// Accept scores within `threshold` of the target.
    AbsRadius,
    /// Accept scores strictly between the target and the threshold.
    Radius,
}

impl ThresholdMode {
    /// Whether this mode compares against a target value.
    #[must_use]
    pub fn needs_target(self) -> bool {
        matches!(self, Self::AbsRadius | Self::Radius)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::AbsRadius => "absRadius",
            Self::Radius => "radius",
        }
    }
}

impl fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "absRadius" => Ok(Self::AbsRadius),
            "radius" => Ok(Self::Radius),
            other => Err(Error::UnknownThresholdMode(other.to_owned())),
        }
    }
}

/// An acceptance test on a scalar score.
///
/// # Examples
///
/// ```
/// use explorer::{Threshold, ThresholdMode};
///
/// let near = Threshold::abs_radius(0.8, 0.05);
/// assert!(near.accepts(0.82));
/// assert!(!near.accepts(0.9));
///
/// let above = Threshold::new(ThresholdMode::Gt, 0.7, None).unwrap();
/// assert!(above.accepts(0.71));
/// assert!(!above.accepts(0.7));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Threshold {
    /// The comparison to apply.
    pub mode: ThresholdMode,
    /// The threshold value (a bound or a radius depending on `mode`).
    pub value: f64,
    /// The target value used by [`ThresholdMode::AbsRadius`] and [`ThresholdMode::Radius`].
    pub target: Option<f64>,
}

impl Threshold {
    /// Creates a threshold, checking that target-based modes carry a target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingThresholdTarget`] if `mode` needs a target and
    /// `target` is `None`.
    pub fn new(mode: ThresholdMode, value: f64, target: Option<f64>) -> Result<Self> {
        let threshold = Self {
            mode,
            value,
            target,
        };
        threshold.validate()?;
        Ok(threshold)
    }

    /// Accept scores strictly greater than `value`.
    #[must_use]
    pub fn above(value: f64) -> Self {
        Self {
            mode: ThresholdMode::Gt,
            value,
            target: None,
        }
    }

    /// Accept scores strictly less than `value`.
    #[must_use]
    pub fn below(value: f64) -> Self {
        Self {
            mode: ThresholdMode::Lt,
            value,
            target: None,
        }
    }

    /// Accept scores within `radius` of `target`.
    #[must_use]
    pub fn abs_radius(target: f64, radius: f64) -> Self {
        Self {
            mode: ThresholdMode::AbsRadius,
            value: radius,
            target: Some(target),
        }
    }

    /// Accept scores strictly between `target` and `upper`.
    #[must_use]
    pub fn radius(target: f64, upper: f64) -> Self {
        Self {
            mode: ThresholdMode::Radius,
            value: upper,
            target: Some(target),
        }
    }

    /// Checks that the threshold is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingThresholdTarget`] when a target-based mode has
    /// no target.
    pub fn validate(&self) -> Result<()> {
        if self.mode.needs_target() && self.target.is_none() {
            return Err(Error::MissingThresholdTarget(self.mode));
        }
        Ok(())
    }

    /// Returns `true` if `score` passes this threshold.
    ///
    /// Target-based modes without a target never accept.
    #[must_use]
    pub fn accepts(&self, score: f64) -> bool {
        match (self.mode, self.target) {
            (ThresholdMode::Gt, _) => score > self.value,
            (ThresholdMode::Lt, _) => score < self.value,
            (ThresholdMode::AbsRadius, Some(m)) => (score - m).abs() < self.value,
            (ThresholdMode::Radius, Some(m)) => m < score && score < self.value,
            (ThresholdMode::AbsRadius | ThresholdMode::Radius, None) => false,
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::above(0.7)
    }
}
