use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(anyhow::Error),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Storage error: {0}")]
    StorageError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Stable lowercase tag for logs, metrics labels and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::StorageError(_) => "storage",
            AppError::ConfigError(_) => "config",
            AppError::InternalError(_) => "internal",
        }
    }

    /// Only storage failures are worth retrying; everything else is a
    /// property of the data or the request and will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StorageError(_))
    }

    /// Convert into the structured body handed to callers.
    pub fn to_response(&self) -> ErrorResponse {
        let (status, error, details) = match self {
            AppError::ValidationError(err) => (
                "invalid_argument",
                "Validation error".to_string(),
                Some(err.to_string()),
            ),
            AppError::BadRequest(err) => ("invalid_argument", err.to_string(), None),
            AppError::NotFound(err) => ("not_found", err.to_string(), None),
            AppError::Conflict(err) => ("already_exists", err.to_string(), None),
            AppError::StorageError(err) => (
                "unavailable",
                "Storage error".to_string(),
                Some(err.to_string()),
            ),
            AppError::ConfigError(err) => (
                "internal",
                "Configuration error".to_string(),
                Some(err.to_string()),
            ),
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "Internal error");
                ("internal", "Internal error".to_string(), None)
            }
        };

        ErrorResponse {
            status,
            error,
            details,
        }
    }
}

/// Caller-facing error shape. Never carries a backtrace.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::StorageError(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(anyhow::Error::new(err))
    }
}
