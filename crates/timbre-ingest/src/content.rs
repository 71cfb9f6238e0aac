//! Content sources: where the raw bytes of a track come from.
//!
//! An event's `source` is an opaque object key. [`DirectoryContentSource`]
//! resolves it below a local root; [`HttpContentSource`] fetches it from an
//! HTTP object store. Every failure is reported as [`IngestError::Fetch`],
//! which the engine treats as transient.

use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use reqwest::Client;

use crate::error::{IngestError, IngestResult};

const USER_AGENT: &str = "timbre/0.1.0 (https://github.com/oxur/timbre)";

/// Fetches the raw content addressed by an event's `source`.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync + Debug {
    /// Fetch the bytes stored under `source`.
    ///
    /// # Errors
    /// Returns [`IngestError::Fetch`] if the object cannot be read.
    async fn fetch(&self, source: &str) -> IngestResult<Vec<u8>>;
}

fn fetch_error(source: &str, message: impl Into<String>) -> IngestError {
    IngestError::Fetch {
        source_ref: source.to_string(),
        message: message.into(),
    }
}

/// Object keys resolved as relative paths under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryContentSource {
    root: PathBuf,
}

impl DirectoryContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map `source` to a path below the root, refusing keys that would
    /// leave it.
    fn resolve(&self, source: &str) -> IngestResult<PathBuf> {
        let key = Path::new(source.trim_start_matches("./"));
        if source.is_empty() {
            return Err(fetch_error(source, "empty object key"));
        }
        if !key.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(fetch_error(source, "object key escapes the content root"));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait::async_trait]
impl ContentSource for DirectoryContentSource {
    async fn fetch(&self, source: &str) -> IngestResult<Vec<u8>> {
        let path = self.resolve(source)?;
        log::debug!("Reading {}", path.display());
        tokio::fs::read(&path)
            .await
            .map_err(|e| fetch_error(source, format!("{}: {e}", path.display())))
    }
}

/// Object keys fetched with `GET {base_url}/{source}`.
#[derive(Debug, Clone)]
pub struct HttpContentSource {
    http: Client,
    base_url: String,
}

impl HttpContentSource {
    /// Create a client for the object store at `base_url`.
    ///
    /// # Errors
    /// Returns [`IngestError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> IngestResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IngestError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, source: &str) -> String {
        format!("{}/{}", self.base_url, source.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self, source: &str) -> IngestResult<Vec<u8>> {
        let url = self.url_for(source);
        log::debug!("GET {url}");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(source, e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_error(source, e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(source, e.to_string()))?;
        Ok(body.to_vec())
    }
}
