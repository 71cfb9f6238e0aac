use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for timbre.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (TIMBRE_* prefix)
/// 3. Config file (~/.config/timbre/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database holding embeddings and the event log.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: TIMBRE_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/timbre/timbre.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// Directory that track content keys are resolved against.
    ///
    /// Can be set via:
    /// - ENV: TIMBRE_CONTENT_ROOT
    /// - Config: content_root = "/srv/tracks"
    /// - Default: ~/.local/share/timbre/content
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,

    /// Base URL of an HTTP object store. When set, content is fetched with
    /// `GET {content_base_url}/{source}` instead of from `content_root`.
    #[serde(default)]
    pub content_base_url: Option<String>,

    /// Length of the vectors produced by the embedder.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Attempts after the first for transient fetch and embed failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial back-off between retries, in milliseconds.
    #[serde(default = "default_retry_min_delay_ms")]
    pub retry_min_delay_ms: u64,

    /// Logger options passed to `twyg` by the binary.
    #[serde(default)]
    pub logging: twyg::Opts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            content_root: default_content_root(),
            content_base_url: None,
            embedding_dimension: default_embedding_dimension(),
            max_retries: default_max_retries(),
            retry_min_delay_ms: default_retry_min_delay_ms(),
            logging: twyg::Opts::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/timbre/config.toml
    /// Reads environment variables with TIMBRE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("timbre");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    /// Reject settings no component can run with.
    ///
    /// # Errors
    /// Returns an error when `embedding_dimension` is zero or
    /// `content_base_url` is not an http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            anyhow::bail!("embedding_dimension must be at least 1");
        }
        if let Some(url) = &self.content_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("content_base_url must be an http(s) URL, got {url}");
            }
        }
        Ok(())
    }
}

/// Get the default database path.
///
/// Returns: ~/.local/share/timbre/timbre.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    data_dir().join("timbre.db")
}

fn default_content_root() -> PathBuf {
    data_dir().join("content")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timbre")
}

const fn default_embedding_dimension() -> usize {
    16
}

const fn default_max_retries() -> usize {
    3
}

const fn default_retry_min_delay_ms() -> u64 {
    100
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/timbre/config.toml
/// - macOS: ~/Library/Application Support/timbre/config.toml
/// - Windows: %APPDATA%\timbre\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timbre")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Timbre Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (TIMBRE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Path to the SQLite database
#
# Stores track embeddings and the log of applied event ids
#
# Can also be set via:
# - CLI: timbre --db /custom/path.db status
# - Environment: TIMBRE_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/timbre.db"

# Directory that event `source` keys are resolved against
#
# Can also be set via:
# - Environment: TIMBRE_CONTENT_ROOT=/srv/tracks
#content_root = "/srv/tracks"

# Fetch content over HTTP instead: GET {content_base_url}/{source}
#content_base_url = "http://localhost:9000/tracks"

# Length of the embedding vectors. Must not change once tracks are stored.
embedding_dimension = 16

# Retries for failed fetches and embeddings, with exponential back-off
max_retries = 3
retry_min_delay_ms = 100
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
