//! The recommendation engine: applies track events exactly once and answers
//! similarity queries.
//!
//! Each event walks `Received → Deduplicated` or
//! `Received → Applying → Applied → IndexRebuilding → Ready`. Events are
//! serialized by holding the store lock for the whole walk. Queries only
//! touch the [`SimilarityIndex`] and never wait for a writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use timbre_core::{
    CommitOutcome, Embedding, Journal, Mutation, MutationOutcome, Operation, StoreStats,
    TrackEvent, TrackId,
};
use timbre_search::{IndexSnapshot, PageRequest, SimilarityIndex};

use crate::content::ContentSource;
use crate::embed::Embedder;
use crate::error::{IngestError, IngestResult};

/// What [`RecommendationEngine::apply_event`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The event was committed. `outcome` is [`MutationOutcome::NoOp`] when
    /// the store was already in the requested state.
    Applied {
        operation: Operation,
        outcome: MutationOutcome,
    },
    /// The event id had already been applied; nothing changed.
    Deduplicated,
}

impl ApplyOutcome {
    #[must_use]
    pub fn is_deduplicated(&self) -> bool {
        matches!(self, Self::Deduplicated)
    }
}

/// One page of recommendations for a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendationPage {
    pub track_id: TrackId,
    pub page: usize,
    pub page_size: usize,
    /// Rank of the first entry of `ids` among all neighbors (0-based).
    pub offset: usize,
    pub ids: Vec<TrackId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub store: StoreStats,
    pub indexed: usize,
    pub generation: u64,
    pub stale: bool,
}

/// Owns the store and the similarity index and keeps them consistent.
#[derive(Debug)]
pub struct RecommendationEngine<S> {
    store: Mutex<S>,
    index: SimilarityIndex,
    content: Arc<dyn ContentSource>,
    embedder: Arc<dyn Embedder>,
    stale: AtomicBool,
}

impl<S> RecommendationEngine<S>
where
    S: Journal + Send,
{
    /// Assemble an engine and build its index from what `store` holds.
    ///
    /// # Errors
    /// Returns an error if the store cannot be exported or its contents do
    /// not form a valid index.
    pub fn new(
        store: S,
        content: Arc<dyn ContentSource>,
        embedder: Arc<dyn Embedder>,
    ) -> IngestResult<Self> {
        if let Some(dimension) = store.dimension()? {
            if dimension != embedder.dimension() {
                log::warn!(
                    "Store holds {dimension}-dimensional embeddings but the embedder produces {}; \
                     add and update events will be rejected",
                    embedder.dimension()
                );
            }
        }

        let index = SimilarityIndex::new();
        index.rebuild(store.export()?)?;
        log::info!("Loaded {} track(s) into the similarity index", index.len());

        Ok(Self {
            store: Mutex::new(store),
            index,
            content,
            embedder,
            stale: AtomicBool::new(false),
        })
    }

    /// Apply `event` unless its id was applied before.
    ///
    /// The store mutation and the event-log entry commit together. After a
    /// change the index is rebuilt before this returns.
    ///
    /// # Errors
    /// - [`IngestError::Fetch`](crate::IngestError::Fetch) or
    ///   [`IngestError::Embed`](crate::IngestError::Embed): nothing was
    ///   written; the event can be retried.
    /// - [`IngestError::Store`](crate::IngestError::Store): the commit
    ///   failed and nothing was written. This includes embeddings of the
    ///   wrong dimension.
    /// - [`IngestError::Rebuild`](crate::IngestError::Rebuild): the event
    ///   was committed but the index could not be rebuilt. The next call,
    ///   even for a duplicate, retries the rebuild.
    pub async fn apply_event(&self, event: &TrackEvent) -> IngestResult<ApplyOutcome> {
        let store = self.store.lock().await;

        if store.is_applied(&event.event_id)? {
            log::debug!("Skipping duplicate event {}", event.event_id);
            self.refresh_if_stale(&*store)?;
            return Ok(ApplyOutcome::Deduplicated);
        }

        let mutation = match event.operation {
            Operation::Add => Mutation::Insert(event.track_id, self.extract(event).await?),
            Operation::Update => Mutation::Update(event.track_id, self.extract(event).await?),
            Operation::Delete => Mutation::Delete(event.track_id),
        };

        let outcome = match store.commit(&event.event_id, &mutation)? {
            CommitOutcome::Duplicate => {
                log::debug!("Event {} was committed concurrently", event.event_id);
                self.refresh_if_stale(&*store)?;
                return Ok(ApplyOutcome::Deduplicated);
            }
            CommitOutcome::Committed(outcome) => outcome,
        };

        match outcome {
            MutationOutcome::Changed => {
                log::info!("Applied {event}");
                self.rebuild_from(&*store)?;
            }
            MutationOutcome::NoOp => {
                log::debug!("Applied {event} without changing the store");
                self.refresh_if_stale(&*store)?;
            }
        }

        Ok(ApplyOutcome::Applied {
            operation: event.operation,
            outcome,
        })
    }

    async fn extract(&self, event: &TrackEvent) -> IngestResult<Embedding> {
        let content = self.content.fetch(&event.source).await?;
        log::debug!(
            "Fetched {} byte(s) for track {} from {}",
            content.len(),
            event.track_id,
            event.source
        );
        self.embedder.embed(&content)
    }

    fn refresh_if_stale(&self, store: &S) -> IngestResult<()> {
        if self.stale.load(Ordering::Acquire) {
            log::info!("Retrying stale index rebuild");
            self.rebuild_from(store)?;
        }
        Ok(())
    }

    fn rebuild_from(&self, store: &S) -> IngestResult<u64> {
        self.stale.store(true, Ordering::Release);
        let generation = store
            .export()
            .map_err(IngestError::from)
            .and_then(|tracks| Ok(self.index.rebuild(tracks)?))
            .map_err(|e| {
                log::error!("Similarity index left stale: {e}");
                IngestError::Rebuild(Box::new(e))
            })?;
        self.stale.store(false, Ordering::Release);
        log::debug!(
            "Rebuilt similarity index: {} track(s), generation {generation}",
            self.index.len()
        );
        Ok(generation)
    }

    /// Rebuild the index from the store regardless of staleness.
    ///
    /// # Errors
    /// Returns an error if the store cannot be exported or the index cannot
    /// be built.
    pub async fn rebuild_index(&self) -> IngestResult<u64> {
        let store = self.store.lock().await;
        self.rebuild_from(&*store)
    }

    /// Every stored track, in id order.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn export(&self) -> IngestResult<Vec<(TrackId, Embedding)>> {
        Ok(self.store.lock().await.export()?)
    }

    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn stats(&self) -> IngestResult<EngineStats> {
        let store = self.store.lock().await.stats()?;
        Ok(EngineStats {
            store,
            indexed: self.index.len(),
            generation: self.index.generation(),
            stale: self.stale.load(Ordering::Acquire),
        })
    }

    pub fn into_store(self) -> S {
        self.store.into_inner()
    }
}

impl<S> RecommendationEngine<S> {
    /// Tracks most similar to `track_id`, for a 1-based page.
    ///
    /// `page` below 1 is treated as 1 and `page_size` is clamped to
    /// `10..=100`.
    ///
    /// # Errors
    /// Returns [`IngestError::Search`](crate::IngestError::Search) with an
    /// unknown-track error if `track_id` is not indexed.
    pub fn recommend(&self, track_id: TrackId, page: i64, page_size: i64) -> IngestResult<Vec<TrackId>> {
        Ok(self.recommend_page(track_id, page, page_size)?.ids)
    }

    /// Like [`recommend`](Self::recommend), with the normalized paging
    /// parameters attached.
    ///
    /// # Errors
    /// Returns an unknown-track error if `track_id` is not indexed.
    pub fn recommend_page(
        &self,
        track_id: TrackId,
        page: i64,
        page_size: i64,
    ) -> IngestResult<RecommendationPage> {
        let request = PageRequest::normalize(page, page_size);
        let ids = self
            .index
            .query(track_id, request.offset(), request.limit())?;

        Ok(RecommendationPage {
            track_id,
            page: request.page(),
            page_size: request.page_size(),
            offset: request.offset(),
            ids,
        })
    }

    /// The index as seen by queries.
    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    /// The current snapshot, stable for as long as the caller holds it.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.index.snapshot()
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use timbre_core::{Database, EmbeddingStore, EventId, EventLog};

    /// Content keyed by source; the content is the embedding as text.
    #[derive(Debug, Default)]
    struct MapContent {
        objects: HashMap<String, Vec<u8>>,
        fetches: AtomicUsize,
    }

    impl MapContent {
        fn with(objects: &[(&str, &str)]) -> Self {
            Self {
                objects: objects
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ContentSource for MapContent {
        async fn fetch(&self, source: &str) -> IngestResult<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.objects
                .get(source)
                .cloned()
                .ok_or_else(|| IngestError::Fetch {
                    source_ref: source.to_string(),
                    message: "no such object".to_string(),
                })
        }
    }

    /// Parses "1.5,2" into `[1.5, 2.0]`.
    #[derive(Debug)]
    struct TextEmbedder;

    impl Embedder for TextEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, content: &[u8]) -> IngestResult<Embedding> {
            let text = std::str::from_utf8(content).map_err(|e| IngestError::Embed(e.to_string()))?;
            let values = text
                .split(',')
                .map(|v| v.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| IngestError::Embed(e.to_string()))?;
            Ok(Embedding::new(values)?)
        }
    }

    fn engine(objects: &[(&str, &str)]) -> (RecommendationEngine<Database>, Arc<MapContent>) {
        let content = Arc::new(MapContent::with(objects));
        let engine = RecommendationEngine::new(
            Database::open_in_memory().unwrap(),
            Arc::clone(&content) as Arc<dyn ContentSource>,
            Arc::new(TextEmbedder),
        )
        .unwrap();
        (engine, content)
    }

    fn add(event_id: &str, track: u64, source: &str) -> TrackEvent {
        TrackEvent::new(event_id, TrackId::new(track), Operation::Add, source)
    }

    #[tokio::test]
    async fn test_add_indexes_track() {
        let (engine, _) = engine(&[("a", "0,0"), ("b", "1,0")]);

        let outcome = engine.apply_event(&add("e1", 1, "a")).await.unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                operation: Operation::Add,
                outcome: MutationOutcome::Changed
            }
        );
        engine.apply_event(&add("e2", 2, "b")).await.unwrap();

        assert_eq!(engine.index().len(), 2);
        assert_eq!(engine.recommend(TrackId::new(1), 1, 10).unwrap(), vec![TrackId::new(2)]);
    }

    #[tokio::test]
    async fn test_duplicate_event_is_skipped() {
        let (engine, content) = engine(&[("a", "0,0"), ("b", "3,4")]);
        engine.apply_event(&add("e1", 1, "a")).await.unwrap();
        let generation = engine.index().generation();

        // Same event id with different content: nothing is fetched or changed.
        let again = add("e1", 1, "b");
        assert!(engine.apply_event(&again).await.unwrap().is_deduplicated());
        assert_eq!(content.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(engine.index().generation(), generation);

        let exported = engine.export().await.unwrap();
        assert_eq!(exported[0].1.as_slice(), &[0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_event_unapplied() {
        let (engine, _) = engine(&[]);
        let err = engine.apply_event(&add("e1", 1, "missing")).await.unwrap_err();
        assert!(err.is_transient());

        let store = engine.into_store();
        assert!(!store.is_applied(&EventId::from("e1")).unwrap());
        assert_eq!(store.track_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embed_failure_leaves_event_unapplied() {
        let (engine, _) = engine(&[("bad", "not numbers")]);
        let err = engine.apply_event(&add("e1", 1, "bad")).await.unwrap_err();
        assert!(matches!(err, IngestError::Embed(_)));
        assert_eq!(engine.stats().await.unwrap().store.events, 0);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected_and_not_marked() {
        let (engine, _) = engine(&[("a", "0,0"), ("wide", "1,2,3")]);
        engine.apply_event(&add("e1", 1, "a")).await.unwrap();

        let err = engine.apply_event(&add("e2", 2, "wide")).await.unwrap_err();
        assert!(err.is_schema_violation());

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.store.tracks, 1);
        assert_eq!(stats.store.events, 1);
        assert_eq!(stats.indexed, 1);
    }

    #[tokio::test]
    async fn test_noop_mutations_are_applied_without_rebuild() {
        let (engine, _) = engine(&[("a", "0,0")]);
        let generation = engine.index().generation();

        let delete = TrackEvent::new("e1", TrackId::new(9), Operation::Delete, "");
        let outcome = engine.apply_event(&delete).await.unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                operation: Operation::Delete,
                outcome: MutationOutcome::NoOp
            }
        );
        assert_eq!(engine.index().generation(), generation);

        // The no-op still counts as applied.
        assert!(engine.apply_event(&delete).await.unwrap().is_deduplicated());
    }

    #[tokio::test]
    async fn test_update_replaces_embedding() {
        let (engine, _) = engine(&[("a", "0,0"), ("b", "1,0"), ("c", "0,1"), ("far", "9,9")]);
        engine.apply_event(&add("e1", 1, "a")).await.unwrap();
        engine.apply_event(&add("e2", 2, "b")).await.unwrap();
        engine.apply_event(&add("e3", 3, "c")).await.unwrap();
        assert_eq!(
            engine.recommend(TrackId::new(1), 1, 10).unwrap(),
            vec![TrackId::new(2), TrackId::new(3)]
        );

        let update = TrackEvent::new("e4", TrackId::new(2), Operation::Update, "far");
        engine.apply_event(&update).await.unwrap();
        assert_eq!(
            engine.recommend(TrackId::new(1), 1, 10).unwrap(),
            vec![TrackId::new(3), TrackId::new(2)]
        );
    }

    #[tokio::test]
    async fn test_delete_removes_from_results() {
        let (engine, _) = engine(&[("a", "0,0"), ("b", "1,0"), ("c", "0,1")]);
        engine.apply_event(&add("e1", 1, "a")).await.unwrap();
        engine.apply_event(&add("e2", 2, "b")).await.unwrap();
        engine.apply_event(&add("e3", 3, "c")).await.unwrap();

        let delete = TrackEvent::new("e4", TrackId::new(2), Operation::Delete, "");
        engine.apply_event(&delete).await.unwrap();

        assert!(engine.recommend(TrackId::new(2), 1, 10).unwrap_err().is_unknown_track());
        assert_eq!(engine.recommend(TrackId::new(1), 1, 10).unwrap(), vec![TrackId::new(3)]);
    }

    #[tokio::test]
    async fn test_stale_index_recovers_on_redelivery() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("timbre.db");
        let content = Arc::new(MapContent::with(&[("a", "0,0"), ("b", "1,0")]));
        let engine = RecommendationEngine::new(
            Database::open(&path).unwrap(),
            content as Arc<dyn ContentSource>,
            Arc::new(TextEmbedder),
        )
        .unwrap();
        engine.apply_event(&add("e1", 1, "a")).await.unwrap();
        let generation = engine.index().generation();

        // A second connection corrupts the stored row behind the engine's back.
        let side = Database::open(&path).unwrap();
        side.conn()
            .execute("UPDATE tracks SET embedding = X'0000' WHERE track_id = 1", [])
            .unwrap();

        let event = add("e2", 2, "b");
        let err = engine.apply_event(&event).await.unwrap_err();
        assert!(err.is_rebuild_failure());

        let stats = engine.stats().await.unwrap();
        assert!(stats.stale);
        assert_eq!(stats.store.events, 2);
        assert_eq!(stats.generation, generation);
        assert_eq!(engine.index().len(), 1);

        side.update(TrackId::new(1), &Embedding::new(vec![0.0, 0.0]).unwrap())
            .unwrap();

        // Redelivery is a duplicate but still brings the index up to date.
        assert!(engine.apply_event(&event).await.unwrap().is_deduplicated());
        let stats = engine.stats().await.unwrap();
        assert!(!stats.stale);
        assert_eq!(stats.generation, generation + 1);
        assert_eq!(
            engine.recommend(TrackId::new(1), 1, 10).unwrap(),
            vec![TrackId::new(2)]
        );
    }

    #[tokio::test]
    async fn test_engine_loads_existing_tracks() {
        let store = Database::open_in_memory().unwrap();
        store
            .insert(TrackId::new(1), &Embedding::new(vec![0.0, 0.0]).unwrap())
            .unwrap();
        store
            .insert(TrackId::new(2), &Embedding::new(vec![1.0, 1.0]).unwrap())
            .unwrap();

        let engine =
            RecommendationEngine::new(store, Arc::new(MapContent::default()), Arc::new(TextEmbedder))
                .unwrap();
        assert_eq!(engine.index().len(), 2);
        assert_eq!(engine.recommend(TrackId::new(2), 1, 10).unwrap(), vec![TrackId::new(1)]);
    }

    #[test]
    fn test_recommend_page_normalizes_paging() {
        let (engine, _) = engine(&[]);
        let err = engine.recommend_page(TrackId::new(1), 0, 1000).unwrap_err();
        assert!(err.is_unknown_track());
    }

    #[tokio::test]
    async fn test_recommend_page_serializes_ids() {
        let (engine, _) = engine(&[("a", "0,0"), ("b", "1,0")]);
        engine.apply_event(&add("e1", 1, "a")).await.unwrap();
        engine.apply_event(&add("e2", 2, "b")).await.unwrap();

        let page = engine.recommend_page(TrackId::new(1), -3, 5).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 10);

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["ids"], serde_json::json!([2]));
        assert_eq!(json["track_id"], 1);
        assert_eq!(json["offset"], 0);
    }

    #[tokio::test]
    async fn test_recommend_page_far_past_the_end() {
        let (engine, _) = engine(&[("a", "0,0"), ("b", "1,0")]);
        engine.apply_event(&add("e1", 1, "a")).await.unwrap();
        engine.apply_event(&add("e2", 2, "b")).await.unwrap();

        let page = engine.recommend_page(TrackId::new(1), i64::MAX, 10).unwrap();
        assert!(page.ids.is_empty());
        assert_eq!(page.offset, usize::MAX);
    }

    #[tokio::test]
    async fn test_stats() {
        let (engine, _) = engine(&[("a", "0,0")]);
        engine.apply_event(&add("e1", 1, "a")).await.unwrap();

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.store.tracks, 1);
        assert_eq!(stats.store.events, 1);
        assert_eq!(stats.store.dimension, Some(2));
        assert_eq!(stats.indexed, 1);
        assert!(!stats.stale);
        assert_eq!(stats.generation, 2);
    }
}
