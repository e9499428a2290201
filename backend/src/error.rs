//! Error types for the sheetapi ingestion pipeline and query layer.
//!
//! - [`IngestError`] - Fatal errors of one ingest (format detection, bulk parse, task failure)
//! - [`ParseError`] - Bulk read failure with line context
//! - [`QueryError`] - Recoverable query-layer errors, mapped to HTTP statuses
//! - [`ArtifactError`] - Saving and loading artifact JSON
//! - [`ServerError`] - Server startup errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Parse Errors
// =============================================================================

/// Bulk read failure after the format sample decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number, when known.
    pub line: Option<u64>,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "Line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(line: u64, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line());
        let message = match err.kind() {
            csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
                format!("Expected {} fields, saw {}", expected_len, len)
            }
            _ => err.to_string(),
        };
        Self { line, message }
    }
}

// =============================================================================
// Ingest Errors
// =============================================================================

/// Machine-distinguishable kind of an [`IngestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestErrorKind {
    Format,
    Parse,
    Internal,
}

/// Errors that abort one run of the ingestion pipeline.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// No encoding, delimiter or sheet produced a table.
    #[error("Format error: {0}")]
    Format(String),

    /// The detected format failed on the full file.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The ingest task itself failed, e.g. it panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn format(message: impl Into<String>) -> Self {
        IngestError::Format(message.into())
    }

    pub fn kind(&self) -> IngestErrorKind {
        match self {
            IngestError::Format(_) => IngestErrorKind::Format,
            IngestError::Parse(_) => IngestErrorKind::Parse,
            IngestError::Internal(_) => IngestErrorKind::Internal,
        }
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors returned by query operations. The engine stays usable after any of them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// No artifact has been loaded yet.
    #[error("No data loaded")]
    NotReady,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Uploaded file has no data rows.
    #[error("{0}")]
    Empty(String),

    #[error("{0}")]
    Internal(String),
}

impl QueryError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::NotReady | QueryError::NotFound(_) => 404,
            QueryError::BadRequest(_) | QueryError::Empty(_) => 400,
            QueryError::Internal(_) => 500,
        }
    }
}

// =============================================================================
// Artifact Errors
// =============================================================================

/// Errors while saving or loading artifact JSON.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document does not match the artifact schema.
    #[error("Artifact schema violations: {}", .0.join("; "))]
    Schema(Vec<String>),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not load artifact: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Ingest failed: {0}")]
    Ingest(#[from] IngestError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type IngestResult<T> = Result<T, IngestError>;

pub type QueryResult<T> = Result<T, QueryError>;

pub type ArtifactResult<T> = Result<T, ArtifactError>;

pub type ServerResult<T> = Result<T, ServerError>;
