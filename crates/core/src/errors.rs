use thiserror::Error;

/// Failures surfaced by a pattern store implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("pattern store unavailable: {0}")]
    Unavailable(String),
    #[error("stored pattern could not be decoded: {0}")]
    Decode(String),
    #[error("pattern key already exists: {0}")]
    Conflict(String),
    #[error("no pattern for key: {0}")]
    NotFound(String),
}

/// Failures from the best-effort suggestion cache. Never escalated.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache invalidation failed: {0}")]
    Invalidation(String),
}

/// Errors the suggestion engine propagates to callers.
///
/// Queries never produce these; they degrade to empty results. Only the
/// operations whose caller must know persistence did not happen (pattern
/// create/update, cleanup, statistics) pass store failures through.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SuggestionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid engine configuration: {0}")]
    Configuration(String),
}
