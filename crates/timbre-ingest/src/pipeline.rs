//! Wiring: store → index → engine, from a [`Config`].

use std::sync::Arc;

use timbre_core::Database;

use crate::config::Config;
use crate::content::{ContentSource, DirectoryContentSource, HttpContentSource};
use crate::embed::{Embedder, HistogramEmbedder};
use crate::engine::RecommendationEngine;
use crate::error::{IngestError, IngestResult};

/// The content source selected by the configuration.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built.
pub fn content_source(config: &Config) -> IngestResult<Arc<dyn ContentSource>> {
    match &config.content_base_url {
        Some(url) => {
            log::debug!("Fetching content from {url}");
            Ok(Arc::new(HttpContentSource::new(url.clone())?))
        }
        None => {
            log::debug!("Reading content from {}", config.content_root.display());
            Ok(Arc::new(DirectoryContentSource::new(
                config.content_root.clone(),
            )))
        }
    }
}

/// # Errors
/// Returns an error if the configured dimension is zero.
pub fn embedder(config: &Config) -> IngestResult<Arc<dyn Embedder>> {
    Ok(Arc::new(HistogramEmbedder::new(config.embedding_dimension)?))
}

/// Open the database named by `config` and build an engine over it.
///
/// # Errors
/// Returns an error if the database cannot be opened or migrated, or if the
/// stored embeddings cannot be indexed.
pub fn build_engine(config: &Config) -> IngestResult<RecommendationEngine<Database>> {
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let database = Database::open(&config.database_path)?;
    log::debug!("Opened database {}", config.database_path.display());

    RecommendationEngine::new(database, content_source(config)?, embedder(config)?)
}

/// Like [`build_engine`] but with an in-memory database.
///
/// # Errors
/// Returns an error if the collaborators cannot be built.
pub fn build_ephemeral_engine(config: &Config) -> IngestResult<RecommendationEngine<Database>> {
    let database = Database::open_in_memory()?;
    RecommendationEngine::new(database, content_source(config)?, embedder(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_source_selection() {
        let config = Config::default();
        let source = content_source(&config).unwrap();
        assert!(format!("{source:?}").contains("DirectoryContentSource"));

        let config = Config {
            content_base_url: Some("http://localhost:9000".to_string()),
            ..Config::default()
        };
        let source = content_source(&config).unwrap();
        assert!(format!("{source:?}").contains("HttpContentSource"));
    }

    #[test]
    fn test_build_engine_creates_database() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            database_path: dir.path().join("nested").join("timbre.db"),
            ..Config::default()
        };

        let engine = build_engine(&config).unwrap();
        assert!(config.database_path.exists());
        assert!(engine.index().is_empty());
        assert_eq!(engine.embedder().dimension(), 16);
    }

    #[test]
    fn test_zero_dimension_is_a_config_error() {
        let config = Config {
            embedding_dimension: 0,
            ..Config::default()
        };
        assert!(matches!(
            build_ephemeral_engine(&config),
            Err(IngestError::Config(_))
        ));
    }
}
