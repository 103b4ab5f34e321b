//! Error types for pipeline construction, fitting and inference

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unknown estimator: {0}")]
    UnknownEstimator(String),

    #[error("Invalid params for {estimator}: {reason}")]
    InvalidParams { estimator: String, reason: String },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Unknown category {value:?} in column {column}")]
    UnknownColumnCategory { column: String, value: String },

    #[error("{0} is not fitted")]
    NotFitted(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("{0} requires a target to fit")]
    MissingTarget(String),

    #[error("Feature mismatch: expected {expected} columns, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Missing values in column {0}")]
    MissingValues(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn invalid_params(estimator: &str, reason: impl ToString) -> Self {
        PipelineError::InvalidParams {
            estimator: estimator.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
