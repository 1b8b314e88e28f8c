use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, NnError>;

/// Everything that can go wrong while building models, running the graph,
/// or driving the estimator.
#[derive(Debug, Error)]
pub enum NnError {
    /// Two tensors (or a tensor and an expected layout) disagree on shape.
    #[error("shape mismatch in {op}: expected {expected}, got {actual}")]
    ShapeMismatch {
        op: &'static str,
        expected: String,
        actual: String,
    },

    /// A hyperparameter or argument is outside its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// Labels are not usable for the requested metric (e.g. non-binary for AUC).
    #[error("invalid labels: {0}")]
    InvalidLabels(String),

    /// `fit`/`evaluate` called before `compile`.
    #[error("estimator has no optimizer/loss bound; call compile() first")]
    NotCompiled,

    #[error("device mismatch: estimator on {estimator}, model on {model}")]
    DeviceMismatch { estimator: String, model: String },

    /// Loaded weights do not line up with the model's parameters.
    #[error("parameter mismatch: {0}")]
    ParamMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NnError {
    /// Shorthand for building a `ShapeMismatch` from two debuggable shapes.
    pub fn shape(op: &'static str, expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        NnError::ShapeMismatch {
            op,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}
