//! Persistence contracts for the recommender.
//!
//! [`EventLog`] remembers which events have been applied, [`EmbeddingStore`]
//! owns the per-track vectors, and [`Journal`] ties the two together so an
//! event's mutation and its log entry commit as a single unit.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Embedding, EventId, EventRecord, TrackId};

/// Append-only record of applied event ids.
pub trait EventLog {
    /// Whether `event_id` has already been applied.
    fn is_applied(&self, event_id: &EventId) -> Result<bool>;

    /// Record `event_id` as applied.
    ///
    /// Returns `true` when this call recorded the id, `false` when it was
    /// already present. The entry is durable once this returns `Ok`.
    fn mark_applied(&self, event_id: &EventId) -> Result<bool>;

    /// Look up the log entry for `event_id`.
    fn event_record(&self, event_id: &EventId) -> Result<Option<EventRecord>>;

    fn event_count(&self) -> Result<u64>;
}

/// Durable mapping from track id to embedding.
///
/// All embeddings in one store share the dimensionality fixed by the first
/// successful insert. `insert` on an existing id and `update`/`delete` on a
/// missing id are no-ops reported as [`MutationOutcome::NoOp`].
pub trait EmbeddingStore {
    fn insert(&self, id: TrackId, embedding: &Embedding) -> Result<MutationOutcome>;

    fn update(&self, id: TrackId, embedding: &Embedding) -> Result<MutationOutcome>;

    fn delete(&self, id: TrackId) -> Result<MutationOutcome>;

    fn get(&self, id: TrackId) -> Result<Option<Embedding>>;

    /// Snapshot of every stored track, sufficient to rebuild the index.
    fn export(&self) -> Result<Vec<(TrackId, Embedding)>>;

    /// The established dimensionality, if any embedding was ever inserted.
    fn dimension(&self) -> Result<Option<usize>>;

    fn track_count(&self) -> Result<u64>;
}

/// A store that can apply a mutation and log its event atomically.
pub trait Journal: EventLog + EmbeddingStore {
    /// Apply `mutation` and record `event_id` in one transaction.
    ///
    /// If `event_id` is already logged nothing is written and
    /// [`CommitOutcome::Duplicate`] is returned. On any error neither the
    /// mutation nor the log entry is visible.
    fn commit(&self, event_id: &EventId, mutation: &Mutation) -> Result<CommitOutcome>;

    fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            tracks: self.track_count()?,
            events: self.event_count()?,
            dimension: self.dimension()?,
        })
    }
}

/// A single change to the embedding store.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(TrackId, Embedding),
    Update(TrackId, Embedding),
    Delete(TrackId),
}

impl Mutation {
    #[must_use]
    pub const fn track_id(&self) -> TrackId {
        match self {
            Self::Insert(id, _) | Self::Update(id, _) | Self::Delete(id) => *id,
        }
    }
}

/// Whether a mutation changed stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    Changed,
    /// Insert of an existing id, or update/delete of a missing id.
    NoOp,
}

/// Result of [`Journal::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(MutationOutcome),
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub tracks: u64,
    pub events: u64,
    pub dimension: Option<usize>,
}
