//! # Runtime Configuration
//!
//! Everything one feature pipeline needs, loaded from the environment.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BEACON_STORAGE_DIR` | `./beacon-data` | Root of the on-disk layout |
//! | `BEACON_FEATURE` | `events` | Feature name (directory segment) |
//! | `BEACON_TRACKING_CONSENT` | `pending` | Consent at startup |
//! | `BEACON_ENDPOINT` | required | Intake URL |
//!
//! Storage, upload and telemetry settings read their own `BEACON_*`
//! variables; see [`StorageConfig::from_env`], [`UploadConfig::from_env`],
//! [`HttpUploaderConfig::from_env`] and [`TelemetryConfig::from_env`].

use bc_01_persistence::{ConfigError, StorageConfig, StorageError};
use bc_02_upload::{HttpUploaderConfig, UploadConfig, UploadError};
use beacon_telemetry::TelemetryConfig;
use shared_types::TrackingConsent;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_STORAGE_DIR: &str = "./beacon-data";
pub const DEFAULT_FEATURE: &str = "events";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Storage configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Upload: {0}")]
    Upload(#[from] UploadError),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub storage_dir: PathBuf,
    pub feature: String,
    pub initial_consent: TrackingConsent,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub uploader: HttpUploaderConfig,
    pub telemetry: TelemetryConfig,
}

impl RuntimeConfig {
    /// Defaults for everything but the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            feature: DEFAULT_FEATURE.to_string(),
            initial_consent: TrackingConsent::Pending,
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            uploader: HttpUploaderConfig::new(endpoint),
            telemetry: TelemetryConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self, RuntimeError> {
        let initial_consent = match env::var("BEACON_TRACKING_CONSENT") {
            Ok(value) => value.parse().map_err(|_| RuntimeError::InvalidEnv {
                var: "BEACON_TRACKING_CONSENT",
                value,
            })?,
            Err(_) => TrackingConsent::Pending,
        };

        let config = Self {
            storage_dir: env::var("BEACON_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_DIR)),
            feature: env::var("BEACON_FEATURE").unwrap_or_else(|_| DEFAULT_FEATURE.to_string()),
            initial_consent,
            storage: StorageConfig::from_env()?,
            upload: UploadConfig::from_env()?,
            uploader: HttpUploaderConfig::from_env()?,
            telemetry: TelemetryConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        bc_01_persistence::config::validate_feature_name(&self.feature)?;
        self.storage.validate()?;
        self.upload.validate()?;
        Ok(())
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = feature.into();
        self
    }

    pub fn with_initial_consent(mut self, consent: TrackingConsent) -> Self {
        self.initial_consent = consent;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_upload(mut self, upload: UploadConfig) -> Self {
        self.upload = upload;
        self
    }
}
