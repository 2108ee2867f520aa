//! Engine error taxonomy. Configuration and shape errors are fatal to the call and are
//! returned unchanged; numeric edge cases on the scoring path are clamped instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid or missing hyperparameters / options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Normalization state or threshold used before being fit or loaded.
    #[error("{0} used before calibration")]
    NotCalibrated(&'static str),

    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("numeric instability: {0}")]
    NumericInstability(String),

    #[error("unknown channel `{0}`")]
    UnknownChannel(String),

    #[error("missing value for channel `{0}`")]
    MissingChannel(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn shape(
        what: &'static str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        EngineError::ShapeMismatch {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
