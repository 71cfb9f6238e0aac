use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use timbre_ingest::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "timbre", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/timbre/timbre.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Apply track events from a JSON-lines stream
    ///
    /// Each line is one event:
    ///
    ///   {"event_id": "…", "track_id": 17, "operation": "add", "source": "tracks/17.bin"}
    ///
    /// For add and update events the content named by `source` is fetched
    /// (from `content_root`, or `content_base_url` when set), embedded, and
    /// stored. Event ids that were applied before are skipped, so a stream
    /// can be replayed safely.
    ///
    /// Malformed lines and unknown operations are logged and skipped. If
    /// content cannot be fetched after the configured retries, ingestion
    /// stops at that event; rerun to resume from it.
    Ingest {
        /// JSON-lines file to read (default: standard input)
        file: Option<PathBuf>,
    },
    /// Apply a single track event
    Apply {
        /// Idempotency key (default: a fresh UUID)
        #[arg(long)]
        event_id: Option<String>,
        #[arg(long)]
        track_id: u64,
        /// add, update, or delete
        #[arg(long)]
        operation: String,
        /// Object key of the track content (add and update only)
        #[arg(long, default_value = "")]
        source: String,
    },
    /// Show the tracks most similar to a track
    Recommend {
        track_id: u64,
        /// 1-based page number
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
        /// Results per page, clamped to 10..=100
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        page_size: i64,
        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show store and index statistics
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file if it does not exist
    Init,
}

fn load_config(db: Option<PathBuf>) -> Result<Config> {
    match db {
        Some(path) => Config::load_with_db_path(path),
        None => Config::load(),
    }
}

fn setup_logging(config: &Config) {
    if let Err(error) = twyg::setup(config.logging.clone()) {
        eprintln!("Could not set up logging: {error:?}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config commands must work even when the config file is broken.
    if let Commands::Config { command } = cli.command {
        return match command {
            ConfigCommand::Show => commands::config::show_config(cli.db),
            ConfigCommand::Path => commands::config::show_path(),
            ConfigCommand::Example => commands::config::show_example(),
            ConfigCommand::Init => commands::config::init_config(),
        };
    }

    let config = load_config(cli.db)?;
    setup_logging(&config);
    log::debug!("Using database {}", config.database_path.display());

    match cli.command {
        Commands::Ingest { file } => {
            commands::run_ingest(&config, file).await?;
        }
        Commands::Apply {
            event_id,
            track_id,
            operation,
            source,
        } => {
            commands::run_apply(&config, event_id, track_id, &operation, source).await?;
        }
        Commands::Recommend {
            track_id,
            page,
            page_size,
            json,
        } => {
            commands::run_recommend(&config, track_id, page, page_size, json)?;
        }
        Commands::Status { json } => {
            commands::show_status(&config, json).await?;
        }
        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_recommend() {
        let cli = Cli::parse_from(["timbre", "recommend", "7", "--page", "-1", "--page-size", "500"]);
        match cli.command {
            Commands::Recommend {
                track_id,
                page,
                page_size,
                json,
            } => {
                assert_eq!(track_id, 7);
                assert_eq!(page, -1);
                assert_eq!(page_size, 500);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_apply_with_global_db() {
        let cli = Cli::parse_from([
            "timbre",
            "apply",
            "--track-id",
            "3",
            "--operation",
            "delete",
            "--db",
            "/tmp/t.db",
        ]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/t.db")));
        assert!(matches!(
            cli.command,
            Commands::Apply {
                track_id: 3,
                event_id: None,
                ..
            }
        ));
    }
}
