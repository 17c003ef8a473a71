//! Prometheus metrics for the Beacon pipeline.
//!
//! All metrics follow the naming convention: `beacon_<component>_<metric>_<unit>`
//! and carry a `feature` label so several pipelines can share one registry.
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., events_written_total)
//! - **Gauge**: Value that can go up or down (e.g., write_queue_depth)
//! - **Histogram**: Distribution of values (e.g., upload_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // STORAGE METRICS
    // =========================================================================

    /// Events appended to an event file
    pub static ref EVENTS_WRITTEN: CounterVec = CounterVec::new(
        Opts::new("beacon_storage_events_written_total", "Events appended to event files"),
        &["feature", "bucket"]  // bucket: authorized/pending
    ).expect("metric creation failed");

    /// Events that never reached disk
    pub static ref EVENTS_DROPPED: CounterVec = CounterVec::new(
        Opts::new("beacon_storage_events_dropped_total", "Events dropped before reaching disk"),
        &["feature", "reason"]  // reason: consent/queue_full/too_large/io_error
    ).expect("metric creation failed");

    /// Event files deleted
    pub static ref FILES_DELETED: CounterVec = CounterVec::new(
        Opts::new("beacon_storage_files_deleted_total", "Event files deleted by reason"),
        &["feature", "reason"]
    ).expect("metric creation failed");

    /// Write tasks waiting on the read/write queue
    pub static ref WRITE_QUEUE_DEPTH: GaugeVec = GaugeVec::new(
        Opts::new("beacon_storage_write_queue_depth", "Write tasks pending on the read/write queue"),
        &["feature"]
    ).expect("metric creation failed");

    // =========================================================================
    // UPLOAD METRICS
    // =========================================================================

    /// Upload attempts by outcome
    pub static ref BATCHES_UPLOADED: CounterVec = CounterVec::new(
        Opts::new("beacon_upload_batches_total", "Batch upload attempts by outcome"),
        &["feature", "status"]
    ).expect("metric creation failed");

    /// Delay before the next upload cycle
    pub static ref UPLOAD_DELAY_SECONDS: GaugeVec = GaugeVec::new(
        Opts::new("beacon_upload_delay_seconds", "Current delay before the next upload cycle"),
        &["feature"]
    ).expect("metric creation failed");

    /// Upload request duration
    pub static ref UPLOAD_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "beacon_upload_duration_seconds",
            "Time spent on one batch upload request"
        ).buckets(exponential_buckets(0.005, 2.0, 12).expect("valid buckets")),
        &["feature"]
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Registering twice is harmless; collectors already present are kept.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Storage
        Box::new(EVENTS_WRITTEN.clone()),
        Box::new(EVENTS_DROPPED.clone()),
        Box::new(FILES_DELETED.clone()),
        Box::new(WRITE_QUEUE_DEPTH.clone()),
        // Upload
        Box::new(BATCHES_UPLOADED.clone()),
        Box::new(UPLOAD_DELAY_SECONDS.clone()),
        Box::new(UPLOAD_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Render all registered metrics in the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
