use anyhow::{Context, Result};
use std::path::PathBuf;

use timbre_ingest::{config, Config};

/// Show the current effective configuration.
pub fn show_config(db: Option<PathBuf>) -> Result<()> {
    let config = match db {
        Some(path) => Config::load_with_db_path(path)?,
        None => Config::load()?,
    };

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!("  content_root: {}", config.content_root.display());
    println!(
        "  content_base_url: {}",
        config.content_base_url.as_deref().unwrap_or("<not set>")
    );
    println!("  embedding_dimension: {}", config.embedding_dimension);
    println!("  max_retries: {}", config.max_retries);
    println!("  retry_min_delay_ms: {}", config.retry_min_delay_ms);
    println!("  logging.level: {:?}", config.logging.level());
    println!("  logging.coloured: {}", config.logging.coloured());
    println!("  logging.output: {:?}", config.logging.output());

    println!("\nPriority: CLI args > ENV vars (TIMBRE_*) > Config file > Defaults");

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    let config_path = config::config_file_path();
    println!("{}", config_path.display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file().context("Failed to create config file")?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure timbre.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
