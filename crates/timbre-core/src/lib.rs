//! Core domain model for timbre.
//!
//! This crate defines the track and event model, the SQLite schema, and the
//! two persistent components the recommender is built on: the append-only
//! event log and the embedding store.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
pub use model::{Embedding, EventId, EventRecord, Operation, TrackEvent, TrackId};
pub use schema::Database;
pub use store::{
    CommitOutcome, EmbeddingStore, EventLog, Journal, Mutation, MutationOutcome, StoreStats,
};
