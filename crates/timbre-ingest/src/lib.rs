//! Event ingestion and recommendation for timbre.
//!
//! Decodes track lifecycle events, fetches and embeds track content, applies
//! each event exactly once through the [`RecommendationEngine`], and serves
//! similarity queries from the rebuilt index.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod content;
pub mod embed;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod resilience;
pub mod source;
pub mod wire;

pub use config::Config;
pub use content::{ContentSource, DirectoryContentSource, HttpContentSource};
pub use embed::{Embedder, HistogramEmbedder};
pub use engine::{ApplyOutcome, EngineStats, RecommendationEngine, RecommendationPage};
pub use error::{IngestError, IngestResult};
pub use ingest::{IngestReport, Ingestor, Rejection};
pub use pipeline::{build_engine, build_ephemeral_engine};
pub use resilience::RetryPolicy;
pub use source::{EventSource, JsonLinesSource};
