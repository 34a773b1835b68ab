//! Error types for the treatment classification pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A request lacks one or more field names the fitted schema requires
    #[error("Schema mismatch: missing required field(s) {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// A stratified split cannot keep every class on both sides
    #[error("Degenerate split: {0}")]
    DegenerateSplit(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Non-fatal conditions reported alongside a successful run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// Oversampling was skipped because the minority class is too small to interpolate
    #[error("Insufficient minority class: label {label} has {count} sample(s), balancing skipped")]
    InsufficientMinorityClass { label: i64, count: usize },
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
