//! Common error types for edgeshift.

use std::fmt;
use thiserror::Error;

/// Kind of stored record, used by not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Proxy,
    Analysis,
    Execution,
    Credentials,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Proxy => write!(f, "Proxy file"),
            RecordKind::Analysis => write!(f, "Analysis"),
            RecordKind::Execution => write!(f, "Migration"),
            RecordKind::Credentials => write!(f, "Credentials"),
        }
    }
}

/// Common error type for edgeshift operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid bundle structure: {0}")]
    InvalidBundleStructure(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Migration {id} cannot be cancelled in status {status}")]
    NotCancellable { id: String, status: String },

    #[error("Migration {id} is already {status}")]
    Terminal { id: String, status: String },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Invalid policy mapping: {0}")]
    InvalidMapping(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a not-found error.
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Malformed uploads and archives.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat(_) | Error::InvalidBundleStructure(_) | Error::UnsupportedFormat(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
