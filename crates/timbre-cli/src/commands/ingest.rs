use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::BufReader;

use timbre_ingest::{build_engine, Config, IngestReport, Ingestor, JsonLinesSource, RetryPolicy};

pub async fn run_ingest(config: &Config, file: Option<PathBuf>) -> Result<()> {
    let engine = build_engine(config).context("Failed to open the recommendation engine")?;
    let ingestor = Ingestor::new(&engine, RetryPolicy::from_config(config));

    let report = match file {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let mut source = JsonLinesSource::new(BufReader::new(file));
            ingestor.run(&mut source).await?
        }
        None => {
            let mut source = JsonLinesSource::new(BufReader::new(tokio::io::stdin()));
            ingestor.run(&mut source).await?
        }
    };

    print_report(&report);

    if report.failed > 0 {
        anyhow::bail!("Stopped at an event that could not be applied; rerun to retry it");
    }
    Ok(())
}

fn print_report(report: &IngestReport) {
    print!("{}", render(report));
}

fn render(report: &IngestReport) -> String {
    let mut out = format!(
        "\nIngestion summary\n\n  Applied:      {}\n  Duplicates:   {}\n  Rejected:     {}\n  Failed:       {}\n",
        report.applied,
        report.deduplicated,
        report.rejected(),
        report.failed
    );

    if !report.rejections.is_empty() {
        out.push_str("\nRejected messages (not marked applied)\n\n");
        let lines: String = report
            .rejections
            .iter()
            .map(|r| format!("  #{} {}\n      {}\n", r.position, r.reason, r.message))
            .collect();
        out.push_str(&lines);
    }
    out
}
