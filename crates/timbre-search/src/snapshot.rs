//! Immutable, standardized view of every track embedding.

use std::cmp::Ordering;
use std::collections::HashMap;

use timbre_core::{Embedding, TrackId};

use crate::error::{SearchError, SearchResult};
use crate::scaling::Scaling;

/// A neighbor of a query track with its distance in standardized space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub track_id: TrackId,
    pub distance: f64,
}

impl Neighbor {
    /// Ascending distance, then ascending id.
    fn rank(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.track_id.cmp(&other.track_id))
    }
}

/// One generation of the similarity index.
///
/// Holds the standardized vectors of every track, laid out row-major in id
/// order, together with the scaling parameters fitted over them. A snapshot
/// is never mutated after it is built.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    ids: Vec<TrackId>,
    positions: HashMap<TrackId, usize>,
    scaled: Vec<f64>,
    scaling: Scaling,
}

impl IndexSnapshot {
    /// A snapshot with no tracks.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            ids: Vec::new(),
            positions: HashMap::new(),
            scaled: Vec::new(),
            scaling: Scaling::fit(std::iter::empty::<&[f32]>(), 0),
        }
    }

    /// Standardize `tracks` into a new snapshot.
    ///
    /// The result depends only on the set of tracks, not on their order.
    ///
    /// # Errors
    /// Returns [`SearchError::DimensionMismatch`] if the embeddings do not
    /// all share one length, and [`SearchError::DuplicateTrack`] if an id
    /// occurs twice.
    pub fn build<I>(tracks: I) -> SearchResult<Self>
    where
        I: IntoIterator<Item = (TrackId, Embedding)>,
    {
        let mut tracks: Vec<(TrackId, Embedding)> = tracks.into_iter().collect();
        if tracks.is_empty() {
            return Ok(Self::empty());
        }
        tracks.sort_by_key(|(id, _)| *id);

        let dimension = tracks[0].1.len();
        for pair in tracks.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(SearchError::DuplicateTrack(pair[0].0));
            }
        }
        if let Some((id, embedding)) = tracks.iter().find(|(_, e)| e.len() != dimension) {
            return Err(SearchError::DimensionMismatch {
                track: *id,
                expected: dimension,
                actual: embedding.len(),
            });
        }

        let scaling = Scaling::fit(tracks.iter().map(|(_, e)| e.as_slice()), dimension);

        let mut ids = Vec::with_capacity(tracks.len());
        let mut positions = HashMap::with_capacity(tracks.len());
        let mut scaled = Vec::with_capacity(tracks.len() * dimension);
        for (position, (id, embedding)) in tracks.iter().enumerate() {
            ids.push(*id);
            positions.insert(*id, position);
            scaled.extend(scaling.transform(embedding.as_slice()));
        }

        Ok(Self {
            ids,
            positions,
            scaled,
            scaling,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Dimensionality of the indexed vectors (0 for an empty snapshot).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.scaling.dimension()
    }

    #[must_use]
    pub fn contains(&self, id: TrackId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Indexed track ids in ascending order.
    #[must_use]
    pub fn track_ids(&self) -> &[TrackId] {
        &self.ids
    }

    #[must_use]
    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    /// Standardized vector of `id`, if indexed.
    #[must_use]
    pub fn scaled_vector(&self, id: TrackId) -> Option<&[f64]> {
        self.positions.get(&id).map(|&position| self.row(position))
    }

    fn row(&self, position: usize) -> &[f64] {
        let dimension = self.dimension();
        &self.scaled[position * dimension..(position + 1) * dimension]
    }

    fn candidates(&self, id: TrackId) -> SearchResult<Vec<Neighbor>> {
        let origin = self
            .scaled_vector(id)
            .ok_or(SearchError::UnknownTrack(id))?;

        Ok(self
            .ids
            .iter()
            .enumerate()
            .filter(|(_, other)| **other != id)
            .map(|(position, other)| Neighbor {
                track_id: *other,
                distance: euclidean(origin, self.row(position)),
            })
            .collect())
    }

    /// Every other track ordered by ascending distance from `id`, ties broken
    /// by ascending id.
    ///
    /// # Errors
    /// Returns [`SearchError::UnknownTrack`] if `id` is not indexed.
    pub fn neighbors(&self, id: TrackId) -> SearchResult<Vec<Neighbor>> {
        let mut neighbors = self.candidates(id)?;
        neighbors.sort_by(Neighbor::rank);
        Ok(neighbors)
    }

    /// The slice `[offset, offset + limit)` of [`neighbors`](Self::neighbors),
    /// clamped to the available results.
    ///
    /// # Errors
    /// Returns [`SearchError::UnknownTrack`] if `id` is not indexed.
    pub fn query(&self, id: TrackId, offset: usize, limit: usize) -> SearchResult<Vec<TrackId>> {
        let mut neighbors = self.candidates(id)?;
        if offset >= neighbors.len() || limit == 0 {
            return Ok(Vec::new());
        }

        let end = offset.saturating_add(limit).min(neighbors.len());
        // Only the first `end` entries need a total order.
        if end < neighbors.len() {
            neighbors.select_nth_unstable_by(end, Neighbor::rank);
            neighbors.truncate(end);
        }
        neighbors.sort_by(Neighbor::rank);

        Ok(neighbors[offset..end].iter().map(|n| n.track_id).collect())
    }
}

impl Default for IndexSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u64, values: &[f32]) -> (TrackId, Embedding) {
        (TrackId::new(id), Embedding::new(values.to_vec()).unwrap())
    }

    fn ids(values: &[u64]) -> Vec<TrackId> {
        values.iter().copied().map(TrackId::new).collect()
    }

    fn scenario() -> IndexSnapshot {
        IndexSnapshot::build(vec![
            track(1, &[0.0, 0.0]),
            track(2, &[1.0, 0.0]),
            track(3, &[0.0, 1.0]),
            track(4, &[5.0, 5.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_scenario_order() {
        let snapshot = scenario();
        assert_eq!(snapshot.query(TrackId::new(1), 0, 3).unwrap(), ids(&[2, 3, 4]));
    }

    #[test]
    fn test_equal_distances_break_ties_by_id() {
        let snapshot = scenario();
        let neighbors = snapshot.neighbors(TrackId::new(1)).unwrap();
        assert_eq!(neighbors[0].distance, neighbors[1].distance);
        assert_eq!(neighbors[0].track_id, TrackId::new(2));
        assert_eq!(neighbors[1].track_id, TrackId::new(3));
    }

    #[test]
    fn test_query_excludes_self() {
        let snapshot = scenario();
        for id in 1..=4 {
            let result = snapshot.query(TrackId::new(id), 0, 10).unwrap();
            assert_eq!(result.len(), 3);
            assert!(!result.contains(&TrackId::new(id)));
        }
    }

    #[test]
    fn test_query_unknown_track() {
        let snapshot = scenario();
        let err = snapshot.query(TrackId::new(99), 0, 10).unwrap_err();
        assert!(err.is_unknown_track());
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = IndexSnapshot::build(Vec::new()).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.dimension(), 0);
        assert!(snapshot.query(TrackId::new(1), 0, 10).unwrap_err().is_unknown_track());
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let snapshot = scenario();
        assert!(snapshot.query(TrackId::new(1), 3, 10).unwrap().is_empty());
        assert!(snapshot.query(TrackId::new(1), 100, 10).unwrap().is_empty());
        assert!(snapshot.query(TrackId::new(1), 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_partial_last_page_is_clamped() {
        let snapshot = scenario();
        assert_eq!(snapshot.query(TrackId::new(1), 2, 10).unwrap(), ids(&[4]));
    }

    #[test]
    fn test_pages_concatenate_to_full_order() {
        let tracks: Vec<_> = (1..=12_u64)
            .map(|id| {
                #[allow(clippy::cast_precision_loss)]
                let x = (id * 7 % 5) as f32;
                #[allow(clippy::cast_precision_loss)]
                let y = (id * 3 % 4) as f32;
                track(id, &[x, y, 1.0])
            })
            .collect();
        let snapshot = IndexSnapshot::build(tracks).unwrap();
        let query = TrackId::new(6);

        let mut paged = snapshot.query(query, 0, 2).unwrap();
        paged.extend(snapshot.query(query, 2, 2).unwrap());
        assert_eq!(paged, snapshot.query(query, 0, 4).unwrap());

        let full: Vec<TrackId> = snapshot
            .neighbors(query)
            .unwrap()
            .iter()
            .map(|n| n.track_id)
            .collect();
        assert_eq!(&full[..4], paged.as_slice());
    }

    #[test]
    fn test_build_is_order_independent() {
        let forward = scenario();
        let reversed = IndexSnapshot::build(vec![
            track(4, &[5.0, 5.0]),
            track(3, &[0.0, 1.0]),
            track(2, &[1.0, 0.0]),
            track(1, &[0.0, 0.0]),
        ])
        .unwrap();
        assert_eq!(forward.track_ids(), reversed.track_ids());
        assert_eq!(forward.scaling(), reversed.scaling());
        assert_eq!(
            forward.scaled_vector(TrackId::new(4)),
            reversed.scaled_vector(TrackId::new(4))
        );
    }

    #[test]
    fn test_build_rejects_mixed_dimensions() {
        let err = IndexSnapshot::build(vec![track(1, &[0.0, 0.0]), track(2, &[1.0])]).unwrap_err();
        assert!(matches!(
            err,
            SearchError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_build_rejects_duplicate_ids() {
        let err = IndexSnapshot::build(vec![track(1, &[0.0]), track(1, &[1.0])]).unwrap_err();
        assert!(matches!(err, SearchError::DuplicateTrack(_)));
    }

    #[test]
    fn test_constant_dimension_is_ignored_by_distance() {
        let snapshot = IndexSnapshot::build(vec![
            track(1, &[0.0, 7.0]),
            track(2, &[2.0, 7.0]),
            track(3, &[1.0, 7.0]),
        ])
        .unwrap();
        assert_eq!(snapshot.scaling().stds()[1], 1.0);
        assert_eq!(snapshot.query(TrackId::new(1), 0, 2).unwrap(), ids(&[3, 2]));
    }

    #[test]
    fn test_single_track_has_no_neighbors() {
        let snapshot = IndexSnapshot::build(vec![track(1, &[1.0, 2.0])]).unwrap();
        assert!(snapshot.query(TrackId::new(1), 0, 10).unwrap().is_empty());
    }
}
