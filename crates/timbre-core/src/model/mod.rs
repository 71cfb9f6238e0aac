pub mod embedding;
pub mod event;
pub mod ids;

pub use embedding::Embedding;
pub use event::{EventRecord, Operation, TrackEvent};
pub use ids::{EventId, TrackId};
