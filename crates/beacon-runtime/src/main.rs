//! # Beacon Agent
//!
//! Forwards newline-delimited events from stdin to an intake endpoint.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `BEACON_*` environment variables
//! 2. Initialize logging and metrics
//! 3. Start the feature pipeline (storage + upload worker)
//! 4. Write one event per non-empty stdin line
//! 5. On EOF or Ctrl+C: flush writes, optionally upload everything, stop
//!
//! Set `BEACON_FLUSH_ON_EXIT=true` to upload all stored data before exiting
//! instead of leaving it for the next run.

use anyhow::{Context, Result};
use beacon_runtime::{FeaturePipeline, RuntimeConfig};
use beacon_telemetry::{gather_metrics, init_telemetry};
use bc_01_persistence::Writer;
use shared_types::Event;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;
    let _telemetry =
        init_telemetry(config.telemetry.clone()).context("Failed to initialize telemetry")?;

    let pipeline =
        FeaturePipeline::from_config(&config).context("Failed to start feature pipeline")?;
    let writer = pipeline.writer();

    info!(
        feature = %pipeline.feature(),
        storage_dir = %config.storage_dir.display(),
        endpoint = %config.uploader.endpoint,
        "Beacon agent running. Reading events from stdin."
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut written = 0u64;
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    writer.write(Event::new(line.into_bytes()));
                    written += 1;
                }
                None => {
                    info!("Stdin closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        }
    }

    if flush_on_exit() {
        let sent = pipeline.flush_all().await;
        info!(batches = sent, "Uploaded stored data before exit");
    }
    pipeline.shutdown().await;

    info!(events = written, "Beacon agent stopped");
    if let Ok(metrics) = gather_metrics() {
        tracing::debug!(%metrics, "Final metrics");
    }
    Ok(())
}

fn flush_on_exit() -> bool {
    match std::env::var("BEACON_FLUSH_ON_EXIT") {
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" | "" => false,
            other => {
                warn!(value = other, "Ignoring invalid BEACON_FLUSH_ON_EXIT");
                false
            }
        },
        Err(_) => false,
    }
}
