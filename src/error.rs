//! Error types for the salary prediction pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PredictorError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PredictorError {
    /// Declared column missing from a file, or schema sets overlap
    #[error("Schema error: {0}")]
    Schema(String),

    /// File missing or unreadable, duplicate ids, or an id join left rows unmatched
    #[error("Load error: {0}")]
    Load(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// An estimator rejected its input
    #[error("Fit error in {model}: {reason}")]
    Fit { model: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model not fitted")]
    NotFitted,

    /// An operation was called before the step it depends on
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

impl PredictorError {
    /// Wrap an estimator error as a fit failure of the named model.
    ///
    /// Fit errors pass through unchanged so the innermost model name is kept.
    pub fn fit_failure(model: impl Into<String>, err: PredictorError) -> Self {
        match err {
            err @ PredictorError::Fit { .. } => err,
            other => PredictorError::Fit {
                model: model.into(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<polars::error::PolarsError> for PredictorError {
    fn from(err: polars::error::PolarsError) -> Self {
        PredictorError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PredictorError {
    fn from(err: serde_json::Error) -> Self {
        PredictorError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for PredictorError {
    fn from(err: bincode::Error) -> Self {
        PredictorError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PredictorError {
    fn from(err: ndarray::ShapeError) -> Self {
        PredictorError::ShapeMismatch {
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
        let err = PredictorError::Schema("column `salary` missing".to_string());
        assert_eq!(err.to_string(), "Schema error: column `salary` missing");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PredictorError = io_err.into();
        assert!(matches!(err, PredictorError::Io(_)));
    }

    #[test]
    fn test_fit_failure_keeps_inner_model() {
        let inner = PredictorError::Fit {
            model: "RandomForest".into(),
            reason: "empty".into(),
        };
        let err = PredictorError::fit_failure("outer", inner);
        match err {
            PredictorError::Fit { model, .. } => assert_eq!(model, "RandomForest"),
            other => panic!("unexpected error: {other:?}"),
        }

        let wrapped = PredictorError::fit_failure("LightGBM", PredictorError::NotFitted);
        assert!(matches!(wrapped, PredictorError::Fit { ref model, .. } if model == "LightGBM"));
    }
}
