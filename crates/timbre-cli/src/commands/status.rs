use anyhow::{Context, Result};

use timbre_ingest::{build_engine, Config};

pub async fn show_status(config: &Config, json: bool) -> Result<()> {
    let engine = build_engine(config).context("Failed to open the recommendation engine")?;
    let stats = engine.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\nTimbre Status\n");
    println!("  Database:  {}", config.database_path.display());
    println!("  Tracks:    {}", stats.store.tracks);
    println!("  Events:    {}", stats.store.events);
    match stats.store.dimension {
        Some(dimension) => println!("  Dimension: {dimension}"),
        None => println!("  Dimension: <not established>"),
    }
    println!("  Indexed:   {}", stats.indexed);

    if stats.store.tracks == 0 {
        println!("\n  Run `timbre ingest <FILE>` to load track events");
    }

    Ok(())
}
