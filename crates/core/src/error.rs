//! Error types surfaced to callers of the cache and providers

use thiserror::Error;

/// Result type for hierarchy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors visible to users of the hierarchy cache
///
/// Cache-internal conditions (stale notifications, anomalous overwrites)
/// never surface here; they are logged and absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No mapping exists for the requested item, cached or authoritative
    #[error("item not found: {0}")]
    NotFound(String),

    /// Path syntax could not be parsed or rebuilt
    #[error("malformed path: {0}")]
    MalformedPath(String),

    /// Generic repository failure
    #[error("repository error: {0}")]
    Repository(String),
}

impl Error {
    /// Shorthand for a `NotFound` error
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Error::NotFound(what.to_string())
    }

    /// Check whether this is a `NotFound` error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
