//! Per-record problems collected during matching and aggregation.

use serde::Serialize;
use service_core::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Storage => "storage",
        }
    }

    /// Errors outside the per-record taxonomy are reported as storage
    /// failures of the unit of work that raised them.
    pub fn from_error(error: &AppError) -> Self {
        match error {
            AppError::ValidationError(_) | AppError::BadRequest(_) => Self::Validation,
            AppError::NotFound(_) => Self::NotFound,
            AppError::Conflict(_) => Self::Conflict,
            _ => Self::Storage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub collection: String,
    pub record_id: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        collection: impl Into<String>,
        record_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            collection: collection.into(),
            record_id: record_id.into(),
            message: message.into(),
        }
    }

    pub fn from_error(
        error: &AppError,
        collection: impl Into<String>,
        record_id: impl Into<String>,
    ) -> Self {
        Self::new(
            DiagnosticKind::from_error(error),
            collection,
            record_id,
            error.to_string(),
        )
    }
}
