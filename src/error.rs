//! Centralized error types for policymail.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::message::MessageId;

/// All errors produced by the policymail library.
#[derive(Error, Debug)]
pub enum PolicyMailError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A JSON record could not be read or written.
    #[error("JSON error on '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The archive to extract does not exist.
    #[error("Archive not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// The archive exists but could not be opened at all.
    #[error("Cannot open archive '{path}': {reason}")]
    ArchiveOpen { path: PathBuf, reason: String },

    /// An archive accessor raised instead of returning a value.
    #[error("Archive accessor '{accessor}' failed: {reason}")]
    Accessor {
        accessor: &'static str,
        reason: String,
    },

    /// A message identifier did not have the `email_NNNNNN` shape.
    #[error("Invalid message id: {0}")]
    InvalidMessageId(String),

    /// No metadata record exists for a committed or requested message.
    #[error("Metadata not found for {0}")]
    MetadataNotFound(MessageId),

    /// The synthesized message container could not be rendered.
    #[error("Cannot build message container: {0}")]
    Container(String),

    /// A classification pattern failed to compile.
    #[error("Invalid classification pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A slip workbook could not be opened or read.
    #[error("Spreadsheet error in '{path}': {reason}")]
    Spreadsheet { path: PathBuf, reason: String },

    /// No previous classification results exist to compare against.
    #[error("No previous classification results at '{0}'")]
    NoPreviousResults(PathBuf),
}

/// Convenience alias for `Result<T, PolicyMailError>`.
pub type Result<T> = std::result::Result<T, PolicyMailError>;

impl PolicyMailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Json` variant from a path and a `serde_json::Error`.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Create an `Accessor` variant for a raising archive accessor.
    pub fn accessor(accessor: &'static str, reason: impl ToString) -> Self {
        Self::Accessor {
            accessor,
            reason: reason.to_string(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `PolicyMailError::io`).
impl From<std::io::Error> for PolicyMailError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
