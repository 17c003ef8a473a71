//! # Upload Configuration
//!
//! Polling delays, batch limits and gate thresholds for the upload worker,
//! plus the HTTP uploader's endpoint and headers.
//!
//! ## Delay Presets
//!
//! | Frequency | min | initial | max |
//! |-----------|-----|---------|-----|
//! | `Frequent` | 0.5s | 2.5s | 5s |
//! | `Average` | 2s | 10s | 20s |
//! | `Rare` | 5s | 25s | 50s |

use crate::conditions::ConnectivityTier;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Errors from upload configuration and uploader construction.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid upload configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid HTTP header {name:?}")]
    InvalidHeader { name: String },

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// How often the worker polls for batches when healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadFrequency {
    Frequent,
    #[default]
    Average,
    Rare,
}

impl UploadFrequency {
    /// The delay floor; initial and ceiling delays are 5x and 10x of it.
    pub fn min_delay(self) -> Duration {
        match self {
            UploadFrequency::Frequent => Duration::from_millis(500),
            UploadFrequency::Average => Duration::from_secs(2),
            UploadFrequency::Rare => Duration::from_secs(5),
        }
    }
}

/// How many batches one upload cycle may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchProcessingLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl BatchProcessingLevel {
    pub fn max_batches_per_upload(self) -> usize {
        match self {
            BatchProcessingLevel::Low => 1,
            BatchProcessingLevel::Medium => 10,
            BatchProcessingLevel::High => 100,
        }
    }
}

/// Configuration for the upload worker.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadConfig {
    /// Delay used at start and whenever no batch is found.
    pub initial_delay: Duration,

    /// Delay after a terminal outcome.
    pub min_delay: Duration,

    /// Ceiling for the backoff.
    pub max_delay: Duration,

    /// Retryable outcomes multiply the delay by `1 + delay_change_rate`.
    pub delay_change_rate: f64,

    /// Batches sent per cycle at most.
    pub max_batches_per_upload: usize,

    /// Battery level (0.0 to 1.0) below which an unplugged device skips uploads.
    pub min_battery_level: f32,

    /// Weakest link uploads may use.
    pub min_connectivity: ConnectivityTier,

    /// Upper bound for one upload request.
    pub request_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::with_presets(UploadFrequency::default(), BatchProcessingLevel::default())
    }
}

impl UploadConfig {
    pub fn with_presets(frequency: UploadFrequency, level: BatchProcessingLevel) -> Self {
        let min = frequency.min_delay();
        Self {
            initial_delay: min * 5,
            min_delay: min,
            max_delay: min * 10,
            delay_change_rate: 0.1,
            max_batches_per_upload: level.max_batches_per_upload(),
            min_battery_level: 0.1,
            min_connectivity: ConnectivityTier::Any,
            request_timeout: Duration::from_secs(20),
        }
    }

    /// Create configuration from environment variables, starting from the
    /// defaults.
    ///
    /// # Environment Variables
    ///
    /// - `BEACON_UPLOAD_FREQUENCY`: `frequent`, `average` or `rare`
    /// - `BEACON_MAX_BATCHES_PER_UPLOAD`: batches per cycle
    /// - `BEACON_MIN_CONNECTIVITY`: `any` or `unconstrained`
    /// - `BEACON_UPLOAD_TIMEOUT_SECS`: request timeout in seconds
    pub fn from_env() -> Result<Self, UploadError> {
        let frequency = match env::var("BEACON_UPLOAD_FREQUENCY") {
            Ok(value) => match value.to_lowercase().as_str() {
                "frequent" => UploadFrequency::Frequent,
                "average" => UploadFrequency::Average,
                "rare" => UploadFrequency::Rare,
                _ => {
                    return Err(UploadError::InvalidEnv {
                        var: "BEACON_UPLOAD_FREQUENCY",
                        value,
                    })
                }
            },
            Err(_) => UploadFrequency::default(),
        };
        let mut config = Self::with_presets(frequency, BatchProcessingLevel::default());

        if let Ok(value) = env::var("BEACON_MAX_BATCHES_PER_UPLOAD") {
            config.max_batches_per_upload =
                value.trim().parse().map_err(|_| UploadError::InvalidEnv {
                    var: "BEACON_MAX_BATCHES_PER_UPLOAD",
                    value,
                })?;
        }
        if let Ok(value) = env::var("BEACON_MIN_CONNECTIVITY") {
            config.min_connectivity = match value.to_lowercase().as_str() {
                "any" => ConnectivityTier::Any,
                "unconstrained" => ConnectivityTier::Unconstrained,
                _ => {
                    return Err(UploadError::InvalidEnv {
                        var: "BEACON_MIN_CONNECTIVITY",
                        value,
                    })
                }
            };
        }
        if let Ok(value) = env::var("BEACON_UPLOAD_TIMEOUT_SECS") {
            let secs: u64 = value.trim().parse().map_err(|_| UploadError::InvalidEnv {
                var: "BEACON_UPLOAD_TIMEOUT_SECS",
                value,
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        let invalid = |msg: String| Err(UploadError::InvalidConfig(msg));

        if self.min_delay.is_zero() {
            return invalid("min_delay must be greater than zero".into());
        }
        if !(self.min_delay <= self.initial_delay && self.initial_delay <= self.max_delay) {
            return invalid(format!(
                "delays must satisfy min <= initial <= max, got {:?} / {:?} / {:?}",
                self.min_delay, self.initial_delay, self.max_delay
            ));
        }
        if !(self.delay_change_rate.is_finite() && self.delay_change_rate > 0.0) {
            return invalid(format!(
                "delay_change_rate must be positive, got {}",
                self.delay_change_rate
            ));
        }
        if self.max_batches_per_upload == 0 {
            return invalid("max_batches_per_upload must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.min_battery_level) {
            return invalid(format!(
                "min_battery_level must be within 0.0..=1.0, got {}",
                self.min_battery_level
            ));
        }
        if self.request_timeout.is_zero() {
            return invalid("request_timeout must be greater than zero".into());
        }
        Ok(())
    }

    /// Set the delays.
    pub fn with_delays(mut self, initial: Duration, min: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    /// Set the backoff growth rate.
    pub fn with_delay_change_rate(mut self, rate: f64) -> Self {
        self.delay_change_rate = rate;
        self
    }

    /// Set the batches-per-cycle limit.
    pub fn with_max_batches_per_upload(mut self, count: usize) -> Self {
        self.max_batches_per_upload = count;
        self
    }

    /// Set the minimum connectivity tier.
    pub fn with_min_connectivity(mut self, tier: ConnectivityTier) -> Self {
        self.min_connectivity = tier;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// How event payloads are joined into one request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadFormat {
    pub prefix: Vec<u8>,
    pub suffix: Vec<u8>,
    pub separator: Vec<u8>,
}

impl PayloadFormat {
    /// Payloads back to back.
    pub fn concatenated() -> Self {
        Self::default()
    }

    /// One payload per line.
    pub fn newline_delimited() -> Self {
        Self {
            separator: b"\n".to_vec(),
            ..Self::default()
        }
    }

    /// `[p1,p2,...]`, for JSON object payloads.
    pub fn json_array() -> Self {
        Self {
            prefix: b"[".to_vec(),
            suffix: b"]".to_vec(),
            separator: b",".to_vec(),
        }
    }

    /// Build a request body from payloads.
    pub fn join<'a>(&self, payloads: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
        let mut body = self.prefix.clone();
        for (i, payload) in payloads.into_iter().enumerate() {
            if i > 0 {
                body.extend_from_slice(&self.separator);
            }
            body.extend_from_slice(payload);
        }
        body.extend_from_slice(&self.suffix);
        body
    }
}

/// Configuration for [`HttpDataUploader`](crate::HttpDataUploader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpUploaderConfig {
    /// Collector URL batches are POSTed to.
    pub endpoint: String,

    /// Headers attached verbatim to every request.
    pub headers: Vec<(String, String)>,

    /// Header carrying a fresh UUID per request; `None` disables it.
    pub request_id_header: Option<String>,

    /// Body layout.
    pub format: PayloadFormat,
}

impl HttpUploaderConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: Vec::new(),
            request_id_header: Some("X-Request-Id".to_string()),
            format: PayloadFormat::default(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Rename or disable the request id header.
    pub fn with_request_id_header(mut self, name: Option<&str>) -> Self {
        self.request_id_header = name.map(str::to_string);
        self
    }

    /// Set the body layout.
    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = format;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BEACON_ENDPOINT` (required): collector URL
    /// - `BEACON_HEADERS`: comma-separated `Name=value` pairs
    /// - `BEACON_REQUEST_ID_HEADER`: request id header name, empty to disable
    /// - `BEACON_PAYLOAD_FORMAT`: `raw`, `ndjson` or `json-array`
    pub fn from_env() -> Result<Self, UploadError> {
        let endpoint =
            env::var("BEACON_ENDPOINT").map_err(|_| UploadError::MissingEnv("BEACON_ENDPOINT"))?;
        let mut config = Self::new(endpoint);

        if let Ok(headers) = env::var("BEACON_HEADERS") {
            for pair in headers.split(',').filter(|p| !p.trim().is_empty()) {
                let (name, value) = pair.split_once('=').ok_or_else(|| UploadError::InvalidEnv {
                    var: "BEACON_HEADERS",
                    value: pair.to_string(),
                })?;
                config = config.with_header(name.trim(), value.trim());
            }
        }
        if let Ok(name) = env::var("BEACON_REQUEST_ID_HEADER") {
            let name = name.trim();
            config = config.with_request_id_header((!name.is_empty()).then_some(name));
        }
        if let Ok(format) = env::var("BEACON_PAYLOAD_FORMAT") {
            config.format = match format.to_lowercase().as_str() {
                "raw" => PayloadFormat::concatenated(),
                "ndjson" => PayloadFormat::newline_delimited(),
                "json-array" => PayloadFormat::json_array(),
                _ => {
                    return Err(UploadError::InvalidEnv {
                        var: "BEACON_PAYLOAD_FORMAT",
                        value: format,
                    })
                }
            };
        }
        Ok(config)
    }
}
