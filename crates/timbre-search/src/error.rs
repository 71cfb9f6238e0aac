//! Error types for index builds and queries.

use thiserror::Error;
use timbre_core::TrackId;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The queried track is not part of the current snapshot.
    #[error("unknown track: {0}")]
    UnknownTrack(TrackId),

    /// A build input disagrees with the dimensionality of the first vector.
    #[error("track {track} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        track: TrackId,
        expected: usize,
        actual: usize,
    },

    #[error("track {0} appears more than once in the build input")]
    DuplicateTrack(TrackId),
}

impl SearchError {
    pub fn is_unknown_track(&self) -> bool {
        matches!(self, Self::UnknownTrack(_))
    }
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;
