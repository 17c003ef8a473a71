//! # Beacon Telemetry
//!
//! Self-observability for the pipeline: structured logs and Prometheus
//! metrics. This is the side channel through which storage and upload
//! failures are reported; none of them reach the embedding application.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use beacon_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! // Pipeline code logs through `tracing` and records metrics from here on.
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BEACON_SERVICE_NAME` | `beacon` | Service name attached to every log line |
//! | `BEACON_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `BEACON_JSON_LOGS` | `false` | Emit JSON lines instead of human-readable text |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingHandle};
pub use metrics::{
    gather_metrics, register_metrics, HistogramTimer, MetricsHandle, BATCHES_UPLOADED,
    EVENTS_DROPPED, EVENTS_WRITTEN, FILES_DELETED, UPLOAD_DELAY_SECONDS, UPLOAD_DURATION,
    WRITE_QUEUE_DEPTH,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    let logging = init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        _logging: logging,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingHandle,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
