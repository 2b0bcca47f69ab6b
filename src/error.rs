//! Error types for the model-building workflow

use thiserror::Error;

/// Result type alias for workflow operations
pub type Result<T> = std::result::Result<T, BuilderError>;

/// Main error type for the workflow core
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("Invalid session_id. Upload a dataset first.")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Target column '{0}' not found in dataset.")]
    InvalidTarget(String),

    #[error("method must be 'normalization' or 'onehot', got '{0}'")]
    InvalidMethod(String),

    #[error("No usable features found (no numeric or categorical columns).")]
    NoUsableFeatures,

    #[error("Invalid {field}: {reason}")]
    InvalidHyperparameter { field: String, reason: String },

    #[error("Preprocessing not configured yet.")]
    NotConfigured,

    #[error("No trained model of type '{0}' for this session.")]
    NoTrainedModel(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Durable session tier unavailable: {0}")]
    PersistenceWarning(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuilderError {
    /// Shorthand for a hyperparameter rejection naming the offending field
    pub fn hyperparameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BuilderError::InvalidHyperparameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can fix this error by changing the request
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            BuilderError::IoError(_)
                | BuilderError::Internal(_)
                | BuilderError::SerializationError(_)
                | BuilderError::ShapeError { .. }
                | BuilderError::ModelNotFitted
        )
    }
}

impl From<polars::error::PolarsError> for BuilderError {
    fn from(err: polars::error::PolarsError) -> Self {
        BuilderError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for BuilderError {
    fn from(err: serde_json::Error) -> Self {
        BuilderError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for BuilderError {
    fn from(err: bincode::Error) -> Self {
        BuilderError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for BuilderError {
    fn from(err: ndarray::ShapeError) -> Self {
        BuilderError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BuilderError::InvalidTarget("label".to_string());
        assert_eq!(err.to_string(), "Target column 'label' not found in dataset.");

        let err = BuilderError::hyperparameter("hidden_layers", "sizes must be positive");
        assert_eq!(err.to_string(), "Invalid hidden_layers: sizes must be positive");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BuilderError = io_err.into();
        assert!(matches!(err, BuilderError::IoError(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_errors() {
        assert!(BuilderError::NotConfigured.is_client_error());
        assert!(BuilderError::NoUsableFeatures.is_client_error());
        assert!(BuilderError::DataError("one class".into()).is_client_error());
        assert!(!BuilderError::Internal("join".into()).is_client_error());
    }
}
