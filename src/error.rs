//! Error types for stackwise

use thiserror::Error;

/// Result type alias for stackwise operations
pub type Result<T> = std::result::Result<T, StackwiseError>;

/// Main error type
#[derive(Error, Debug)]
pub enum StackwiseError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Plot error: {0}")]
    PlotError(String),

    #[error("Report error: {0}")]
    ReportError(String),
}

impl From<polars::error::PolarsError> for StackwiseError {
    fn from(err: polars::error::PolarsError) -> Self {
        StackwiseError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for StackwiseError {
    fn from(err: serde_json::Error) -> Self {
        StackwiseError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for StackwiseError {
    fn from(err: ndarray::ShapeError) -> Self {
        StackwiseError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<handlebars::RenderError> for StackwiseError {
    fn from(err: handlebars::RenderError) -> Self {
        StackwiseError::ReportError(err.to_string())
    }
}
