use crate::types::ThresholdMode;

/// Errors returned by sampler construction, search runs and mixing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a sampler needs training examples but the oracle has none.
    #[error("oracle has no training examples")]
    EmptyTrainingSet,

    /// Returned when a generic rejection sampler is given no seed points.
    #[error("seed pool cannot be empty")]
    EmptySeedPool,

    /// Returned when a vector does not have the expected dimension.
    #[error("dimension mismatch: expected {expected} components, got {got}")]
    DimensionMismatch {
        /// The expected number of components.
        expected: usize,
        /// The actual number of components.
        got: usize,
    },

    /// Returned when a dimension filter names an index outside the vector.
    #[error("filter index {index} is out of range for a {dim}-dimensional vector")]
    FilterIndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The dimension of the vectors being searched.
        dim: usize,
    },

    /// Returned when a threshold mode that needs a target value has none.
    #[error("threshold mode `{0}` requires a threshold target")]
    MissingThresholdTarget(ThresholdMode),

    /// Returned when a threshold mode name cannot be parsed.
    #[error("unknown threshold mode: {0}")]
    UnknownThresholdMode(String),

    /// Returned when a configuration value is outside its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// The configuration field.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Returned when the score oracle fails to evaluate or retrain.
    #[error("oracle error: {0}")]
    Oracle(String),

    /// Returned when the local minimizer fails.
    #[error("minimizer error: {0}")]
    Minimizer(String),

    /// Returned when a search worker thread cannot be spawned.
    #[error("failed to spawn search task: {0}")]
    Spawn(#[from] std::io::Error),

    /// Returned when a search worker thread panics.
    #[error("search task panicked: {0}")]
    TaskPanicked(String),

    /// Returned when an async join fails.
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
