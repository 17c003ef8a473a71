//! Structured logging setup.
//!
//! Every crate logs through `tracing` with structured fields (`feature`,
//! `file`, `status`, ...). This module installs the global subscriber that
//! renders them, either as human-readable text or as JSON lines.

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, EnvFilter};

/// Handle returned by [`init_logging`].
pub struct LoggingHandle {
    /// `false` when another global subscriber was already installed.
    pub installed: bool,
}

/// Install the global `tracing` subscriber.
///
/// Calling it again (or after the host installed its own subscriber) is not
/// an error; the existing subscriber is kept.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingHandle, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("log level '{}': {}", config.log_level, e)))?;

    let installed = if config.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .with_current_span(false)
            .try_init()
            .is_ok()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(
            service = %config.service_name,
            level = %config.log_level,
            "Structured logging configured"
        );
    }

    Ok(LoggingHandle { installed })
}
