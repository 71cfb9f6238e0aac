//! Similarity search for timbre.
//!
//! Builds a standardized in-memory snapshot of every track embedding and
//! answers paginated nearest-neighbor queries against it. Rebuilds replace
//! the snapshot atomically, so concurrent readers always see one complete
//! generation of the index.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod index;
pub mod pagination;
pub mod scaling;
pub mod snapshot;

pub use error::{SearchError, SearchResult};
pub use index::SimilarityIndex;
pub use pagination::PageRequest;
pub use scaling::Scaling;
pub use snapshot::{IndexSnapshot, Neighbor};
