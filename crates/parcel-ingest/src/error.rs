//! # Ingestion Errors
//!
//! [`IngestError`] rejects a whole upload: the file could not be read as a
//! table with the expected header. Everything that can go wrong with a
//! single row is a [`RowFailure`] and ends up in the report instead.

use thiserror::Error;

use parcel_core::ValidationError;
use parcel_lifecycle::LifecycleError;

/// File-level failure. The upload is not processed at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("upload is empty or has no header row")]
    MissingHeader,

    #[error("upload is missing required columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("column '{column}' appears more than once in the header")]
    DuplicateColumn { column: String },

    /// The bytes are not a readable CSV table.
    #[error("unreadable upload{}: {message}", line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Unreadable { line: Option<u64>, message: String },
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingHeader => "MISSING_HEADER",
            Self::MissingColumns { .. } => "MISSING_COLUMNS",
            Self::DuplicateColumn { .. } => "DUPLICATE_COLUMN",
            Self::Unreadable { .. } => "UNREADABLE_UPLOAD",
        }
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line());
        Self::Unreadable {
            line,
            message: err.to_string(),
        }
    }
}

/// Why one row was not turned into a shipment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowFailure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl RowFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Lifecycle(err) => err.code(),
        }
    }
}
