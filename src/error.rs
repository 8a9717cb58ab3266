//! Error types for the suggestion core

use std::time::Duration;
use thiserror::Error;

/// Failure reaching or querying a storage backend.
///
/// The dispatch engine recovers every variant locally (fail-open); callers of
/// `suggest` never see one.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store cannot evaluate this kind of backend expression
    #[error("unsupported query for this store: {0}")]
    Unsupported(String),

    /// The backend rejected the expression
    #[error("query syntax error: {0}")]
    Syntax(String),

    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    /// The failure guard is short-circuiting calls
    #[error("backend circuit is open")]
    CircuitOpen,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the suggestion service and rate governor
#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("rate limit exceeded")]
    RateLimited,
}

impl SuggestError {
    /// Short machine-readable label, used in logs and HTTP bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage_failure",
            Self::RateLimited => "rate_limited",
        }
    }
}
