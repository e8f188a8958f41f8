//! Error types for the data-quality engine.
//!
//! Every failure path in the engine is a typed [`QualityError`]; nothing in the
//! core terminates the process. Errors serialize as `{code, message}` so a
//! transport layer can hand them straight to a client.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the data-quality engine.
#[derive(Error, Debug)]
pub enum QualityError {
    /// The requested dataset id is not in the store.
    #[error("Dataset '{0}' not found. Re-upload and retry.")]
    NotFound(String),

    /// The store holds no datasets at all.
    #[error("No datasets in memory. Upload first.")]
    Empty,

    /// A specific computation step failed unexpectedly.
    #[error("Computation failed during {step}: {reason}")]
    ComputationFailure { step: String, reason: String },

    /// A column referenced by a request does not exist in the table.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration or request options.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Uploaded bytes could not be parsed into a table.
    #[error("CSV parse error: {0}")]
    Parse(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<QualityError>,
    },
}

impl QualityError {
    /// Shorthand for a [`QualityError::ComputationFailure`].
    pub fn computation(step: impl Into<String>, reason: impl ToString) -> Self {
        QualityError::ComputationFailure {
            step: step.into(),
            reason: reason.to_string(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        QualityError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable code for the transport layer.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Empty => "EMPTY",
            Self::ComputationFailure { .. } => "COMPUTATION_FAILURE",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// True for the "dataset is gone" conditions the user fixes by re-uploading.
    pub fn is_missing_dataset(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Empty => true,
            Self::WithContext { source, .. } => source.is_missing_dataset(),
            _ => false,
        }
    }

    /// Check if this error is recoverable by the caller changing its request.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NotFound(_)
            | Self::Empty
            | Self::ColumnNotFound(_)
            | Self::InvalidConfig(_)
            | Self::Parse(_) => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl Serialize for QualityError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("QualityError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, QualityError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Report any error as a [`QualityError::ComputationFailure`] of `step`.
    fn computation(self, step: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn computation(self, step: impl Into<String>) -> Result<T> {
        self.map_err(|e| QualityError::computation(step, e))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| QualityError::Polars(e).with_context(context))
    }

    fn computation(self, step: impl Into<String>) -> Result<T> {
        self.map_err(|e| QualityError::computation(step, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(QualityError::Empty.error_code(), "EMPTY");
        assert_eq!(
            QualityError::NotFound("abc".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            QualityError::computation("iforest", "boom").error_code(),
            "COMPUTATION_FAILURE"
        );
    }

    #[test]
    fn test_is_missing_dataset() {
        assert!(QualityError::Empty.is_missing_dataset());
        assert!(QualityError::NotFound("x".to_string()).is_missing_dataset());
        assert!(
            QualityError::NotFound("x".to_string())
                .with_context("profile")
                .is_missing_dataset()
        );
        assert!(!QualityError::ColumnNotFound("x".to_string()).is_missing_dataset());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(QualityError::Empty.is_recoverable());
        assert!(QualityError::ColumnNotFound("well".to_string()).is_recoverable());
        assert!(!QualityError::computation("profile", "bad shape").is_recoverable());
    }

    #[test]
    fn test_error_serialization() {
        let error = QualityError::NotFound("ds-1".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("NOT_FOUND"));
        assert!(json.contains("ds-1"));
        assert!(json.contains("Re-upload"));
    }

    #[test]
    fn test_step_failures_are_computation_failures() {
        let polars_err: std::result::Result<(), polars::error::PolarsError> = Err(
            polars::error::PolarsError::ComputeError("cannot cast".into()),
        );
        let err = polars_err
            .computation("IQR fences for 'depth'")
            .context("IQR detection")
            .unwrap_err();
        assert_eq!(err.error_code(), "COMPUTATION_FAILURE");
        assert!(err.to_string().contains("IQR fences for 'depth'"));
        assert!(!err.is_recoverable());

        let engine_err: Result<()> = Err(QualityError::ColumnNotFound("x".to_string()));
        assert_eq!(
            engine_err.computation("profile").unwrap_err().error_code(),
            "COMPUTATION_FAILURE"
        );
    }

    #[test]
    fn test_with_context() {
        let error = QualityError::ColumnNotFound("depth".to_string()).with_context("During dedup");
        assert!(error.to_string().contains("During dedup"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }
}
