//! Batch CSV Scorer
//!
//! Reads a CSV of narrative feedback, scores every row in-process and writes
//! the file back out with the QuAL columns appended.
//!
//! Usage: score-csv <input.csv> <output.csv> [feedback columns...]

use anyhow::{bail, Context, Result};
use qual_scoring::{
    channel::spawn_worker,
    config::AppConfig,
    logging,
    metrics::PipelineMetrics,
    models::registry::{ModelRegistry, OnnxClassifierFactory},
    tabular,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const DEFAULT_FEEDBACK_COLUMN: &str = "Feedback";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: score-csv <input.csv> <output.csv> [feedback columns...]");
    }
    let input = &args[1];
    let output = &args[2];
    let feedback_columns: Vec<String> = if args.len() > 3 {
        args[3..].to_vec()
    } else {
        vec![DEFAULT_FEEDBACK_COLUMN.to_string()]
    };

    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    let file = File::open(input).with_context(|| format!("Failed to open {}", input))?;
    let table = tabular::read_rows(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", input))?;
    let comments = tabular::collect_comments(&table, &feedback_columns)?;
    info!(
        rows = table.len(),
        columns = ?feedback_columns,
        "Loaded feedback from {}", input
    );

    let metrics = Arc::new(PipelineMetrics::new());
    let factory = OnnxClassifierFactory::new(config.models.clone())?;
    let registry = Arc::new(ModelRegistry::new(Arc::new(factory)));
    let mut worker = spawn_worker(
        registry,
        config.scoring.clone(),
        metrics.clone(),
        config.pipeline.channel_capacity,
    );

    info!("Loading QuAL score models...");
    worker.wait_ready().await?;

    let total = comments.len();
    let started = Instant::now();
    let scores = worker
        .score(comments, |count| {
            if count % 10 == 0 || count == total {
                info!("Scoring comment {} of {}", count, total);
            }
        })
        .await?;
    worker.shutdown().await;
    info!(
        comments = total,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Scoring complete"
    );

    let file = File::create(output).with_context(|| format!("Failed to create {}", output))?;
    tabular::write_scored(BufWriter::new(file), &table, &scores)
        .with_context(|| format!("Failed to write {}", output))?;
    info!("Wrote scored file to {}", output);

    metrics.print_summary();
    Ok(())
}
