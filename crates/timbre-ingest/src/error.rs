//! Error types for event ingestion and recommendation queries.

use thiserror::Error;
use timbre_search::SearchError;

/// Errors that can occur while applying events or answering queries.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The track content could not be fetched.
    #[error("failed to fetch content {source_ref}: {message}")]
    Fetch { source_ref: String, message: String },

    /// The feature extractor could not produce an embedding.
    #[error("embedding failed: {0}")]
    Embed(String),

    /// A message could not be decoded into a track event.
    #[error("malformed event: {0}")]
    Decode(String),

    /// A message named an operation other than add, update, or delete.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// An error propagated from the store or the event log.
    #[error("store error: {0}")]
    Store(#[from] timbre_core::Error),

    /// An error propagated from the similarity index.
    #[error("index error: {0}")]
    Search(#[from] SearchError),

    /// The event was committed but the index could not be rebuilt from the
    /// store. The index is stale until a later rebuild succeeds.
    #[error("index rebuild failed after commit: {0}")]
    Rebuild(#[source] Box<IngestError>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Returns `true` when the error is transient and the event may be
    /// applied if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Embed(_))
    }

    /// Returns `true` when the message itself is unusable and must not be
    /// retried as-is.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::UnknownOperation(_))
    }

    /// Returns `true` when an embedding did not match the store's schema.
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_schema_violation())
    }

    /// Returns `true` when an applied event left the index stale.
    pub fn is_rebuild_failure(&self) -> bool {
        matches!(self, Self::Rebuild(_))
    }

    /// Returns `true` when a query named a track that is not indexed.
    pub fn is_unknown_track(&self) -> bool {
        matches!(self, Self::Search(e) if e.is_unknown_track())
    }
}

/// Convenience alias for ingestion results.
pub type IngestResult<T> = std::result::Result<T, IngestError>;
