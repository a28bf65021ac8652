//! Error types shared by every client of the logic backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::QueryKind;

/// The main error type for DFS operations.
#[derive(Debug, Error)]
pub enum DfsError {
    /// The backend process/runtime could not be reached.
    #[error("logic backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Sampling or evaluation was attempted against a world that was never loaded.
    #[error("world specification not loaded: {0}")]
    SpecificationNotLoaded(String),

    /// Caller-supplied counts, formulas or vectors failed validation before any
    /// backend round-trip.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend raised, or found no solution, for a query.
    #[error("backend query {query} failed: {reason}")]
    BackendQueryFailed { query: QueryKind, reason: String },

    /// Backend output did not have the expected term shape.
    #[error("malformed term `{term}`: {reason}")]
    MalformedTerm { term: String, reason: String },

    /// A model vector cannot be turned back into a model.
    #[error("malformed model vector: {0}")]
    MalformedVector(String),

    /// Result cache storage failed.
    #[error("result cache error: {0}")]
    Cache(#[from] sled::Error),

    /// Encoding or decoding a wire message failed.
    #[error("wire encoding error: {0}")]
    Wire(#[from] serde_json::Error),
}

/// Result type for DFS operations.
pub type Result<T> = std::result::Result<T, DfsError>;

impl DfsError {
    /// Shorthand for [`DfsError::MalformedTerm`]; long inputs are abbreviated.
    pub fn malformed(term: &str, reason: impl Into<String>) -> Self {
        const MAX: usize = 120;
        let term = match term.char_indices().nth(MAX) {
            Some((cut, _)) => format!("{}...", &term[..cut]),
            None => term.to_string(),
        };
        DfsError::MalformedTerm {
            term,
            reason: reason.into(),
        }
    }

    pub fn query_failed(query: QueryKind, reason: impl Into<String>) -> Self {
        DfsError::BackendQueryFailed {
            query,
            reason: reason.into(),
        }
    }
}

/// Kind of a [`DfsError`] as it travels over the IPC channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BackendUnavailable,
    SpecificationNotLoaded,
    InvalidArgument,
    BackendQueryFailed,
    MalformedTerm,
    MalformedVector,
    Internal,
}

/// Serialisable form of a [`DfsError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
}

impl WireError {
    pub fn from_error(err: &DfsError) -> Self {
        let (kind, message) = match err {
            DfsError::BackendUnavailable(m) => (ErrorKind::BackendUnavailable, m.clone()),
            DfsError::SpecificationNotLoaded(m) => (ErrorKind::SpecificationNotLoaded, m.clone()),
            DfsError::InvalidArgument(m) => (ErrorKind::InvalidArgument, m.clone()),
            DfsError::BackendQueryFailed { reason, .. } => {
                (ErrorKind::BackendQueryFailed, reason.clone())
            }
            DfsError::MalformedTerm { term, reason } => {
                (ErrorKind::MalformedTerm, format!("{term}: {reason}"))
            }
            DfsError::MalformedVector(m) => (ErrorKind::MalformedVector, m.clone()),
            other => (ErrorKind::Internal, other.to_string()),
        };
        Self { kind, message }
    }

    /// Rebuilds the error on the client side. `query` is the query the error answers.
    pub fn into_error(self, query: QueryKind) -> DfsError {
        match self.kind {
            ErrorKind::BackendUnavailable => DfsError::BackendUnavailable(self.message),
            ErrorKind::SpecificationNotLoaded => DfsError::SpecificationNotLoaded(self.message),
            ErrorKind::InvalidArgument => DfsError::InvalidArgument(self.message),
            ErrorKind::MalformedTerm => DfsError::malformed("<remote>", self.message),
            ErrorKind::MalformedVector => DfsError::MalformedVector(self.message),
            ErrorKind::BackendQueryFailed | ErrorKind::Internal => {
                DfsError::query_failed(query, self.message)
            }
        }
    }
}
