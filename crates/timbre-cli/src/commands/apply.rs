use anyhow::{Context, Result};

use timbre_core::{Operation, TrackEvent, TrackId};
use timbre_ingest::{build_engine, ApplyOutcome, Config, Ingestor, RetryPolicy};

pub async fn run_apply(
    config: &Config,
    event_id: Option<String>,
    track_id: u64,
    operation: &str,
    source: String,
) -> Result<()> {
    let operation: Operation = operation
        .parse()
        .with_context(|| format!("Invalid operation '{operation}' (expected add, update, or delete)"))?;
    if operation.needs_content() && source.is_empty() {
        anyhow::bail!("--source is required for {operation} events");
    }

    let event_id = event_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let event = TrackEvent::new(event_id, TrackId::new(track_id), operation, source);

    let engine = build_engine(config).context("Failed to open the recommendation engine")?;
    let outcome = Ingestor::new(&engine, RetryPolicy::from_config(config))
        .apply(&event)
        .await
        .with_context(|| format!("Failed to apply {event}"))?;

    match outcome {
        ApplyOutcome::Applied { outcome, .. } => {
            println!("✓ Applied {event} ({outcome:?})");
        }
        ApplyOutcome::Deduplicated => {
            println!("Event {} was already applied; nothing changed", event.event_id);
        }
    }

    Ok(())
}
