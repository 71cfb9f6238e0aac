//! The live similarity index: the current snapshot plus its swap discipline.

use std::sync::Arc;

use parking_lot::RwLock;
use timbre_core::{Embedding, TrackId};

use crate::error::SearchResult;
use crate::snapshot::IndexSnapshot;

#[derive(Debug, Default)]
struct Current {
    snapshot: Arc<IndexSnapshot>,
    generation: u64,
}

/// Holds the current [`IndexSnapshot`] behind a shared/exclusive lock.
///
/// Readers take the shared lock only long enough to clone the snapshot
/// pointer and then query without holding it. A rebuild standardizes the new
/// snapshot first and takes the exclusive lock only to swap the pointer, so a
/// query sees either the previous generation or the new one, never a
/// partially built index.
#[derive(Debug, Default)]
pub struct SimilarityIndex {
    current: RwLock<Current>,
}

impl SimilarityIndex {
    /// An empty index (generation 0).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a full export of the store and swap it in.
    ///
    /// On error the previous snapshot stays in place.
    pub fn rebuild<I>(&self, tracks: I) -> SearchResult<u64>
    where
        I: IntoIterator<Item = (TrackId, Embedding)>,
    {
        let snapshot = IndexSnapshot::build(tracks)?;
        log::debug!(
            "Built index snapshot: {} tracks, {} dimensions",
            snapshot.len(),
            snapshot.dimension()
        );
        Ok(self.replace(snapshot))
    }

    /// Swap in a prebuilt snapshot, returning the new generation number.
    pub fn replace(&self, snapshot: IndexSnapshot) -> u64 {
        let snapshot = Arc::new(snapshot);
        let mut current = self.current.write();
        current.snapshot = snapshot;
        current.generation += 1;
        current.generation
    }

    /// The snapshot queries are currently served from.
    #[must_use]
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.current.read().snapshot)
    }

    /// Number of completed rebuilds.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Nearest neighbors of `id`, sliced to `[offset, offset + limit)`.
    ///
    /// # Errors
    /// Returns [`SearchError::UnknownTrack`](crate::SearchError::UnknownTrack)
    /// if `id` is not in the current snapshot.
    pub fn query(&self, id: TrackId, offset: usize, limit: usize) -> SearchResult<Vec<TrackId>> {
        self.snapshot().query(id, offset, limit)
    }
}
