//! # Storage Configuration
//!
//! Thresholds for file rotation, directory size, file ages and the write
//! queue. Defaults follow the `Medium` batch size preset.
//!
//! ## File Age Windows
//!
//! ```text
//! created        max_file_age_for_write   min_file_age_for_read      max_file_age_for_read
//!    │──────── writable ────────│─── settling ───│────── readable ──────────│ obsolete
//! ```
//!
//! A file stops accepting writes before it becomes readable, so the reader
//! never sees a file the writer may still append to.

use crate::codec::DEFAULT_MAX_BLOCK_LENGTH;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("min_file_age_for_read ({read:?}) must be greater than max_file_age_for_write ({write:?})")]
    OverlappingFileAges { write: Duration, read: Duration },

    #[error("max_file_age_for_read ({max:?}) must not be below min_file_age_for_read ({min:?})")]
    ReadWindowInverted { min: Duration, max: Duration },

    #[error("max_object_size ({object}) must not exceed max_file_size ({file})")]
    ObjectLargerThanFile { object: u64, file: u64 },

    #[error("invalid feature name {name:?}: must be non-empty and free of path separators")]
    InvalidFeatureName { name: String },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Batch size preset. Sets the mean age at which files are closed for
/// writing and opened for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchSize {
    /// 3 seconds.
    Small,
    /// 10 seconds.
    #[default]
    Medium,
    /// 35 seconds.
    Large,
}

impl BatchSize {
    pub fn mean_file_age(self) -> Duration {
        match self {
            BatchSize::Small => Duration::from_secs(3),
            BatchSize::Medium => Duration::from_secs(10),
            BatchSize::Large => Duration::from_secs(35),
        }
    }
}

/// Configuration for event storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Maximum size of one event file (default: 4 MiB).
    pub max_file_size: u64,

    /// Maximum total size of one bucket directory (default: 512 MiB).
    ///
    /// Exceeded sizes are purged, oldest files first, before a new file is
    /// created.
    pub max_directory_size: u64,

    /// A file older than this receives no more writes.
    pub max_file_age_for_write: Duration,

    /// A file younger than this is not read.
    pub min_file_age_for_read: Duration,

    /// A file older than this is deleted without being read (default: 18h).
    pub max_file_age_for_read: Duration,

    /// Maximum number of events in one file (default: 500).
    pub max_objects_in_file: u64,

    /// Maximum encoded size of one event (default: 512 KiB).
    pub max_object_size: u64,

    /// Maximum payload length of one block (default: 10 MiB).
    pub max_block_length: u32,

    /// Maximum number of write tasks waiting on the read/write queue.
    pub queue_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::for_batch_size(BatchSize::default())
    }
}

impl StorageConfig {
    /// Preset derived from a mean file age: files close for writing 5%
    /// below it and open for reading 5% above it.
    pub fn for_batch_size(batch_size: BatchSize) -> Self {
        let mean_millis = batch_size.mean_file_age().as_millis() as u64;
        Self {
            max_file_size: 4 * 1024 * 1024,
            max_directory_size: 512 * 1024 * 1024,
            max_file_age_for_write: Duration::from_millis(mean_millis * 95 / 100),
            min_file_age_for_read: Duration::from_millis(mean_millis * 105 / 100),
            max_file_age_for_read: Duration::from_secs(18 * 60 * 60),
            max_objects_in_file: 500,
            max_object_size: 512 * 1024,
            max_block_length: DEFAULT_MAX_BLOCK_LENGTH,
            queue_capacity: 1024,
        }
    }

    /// Create configuration from environment variables, starting from the
    /// defaults.
    ///
    /// # Environment Variables
    ///
    /// - `BEACON_BATCH_SIZE`: `small`, `medium` or `large`
    /// - `BEACON_MAX_FILE_SIZE`: bytes
    /// - `BEACON_MAX_DIRECTORY_SIZE`: bytes
    /// - `BEACON_MAX_FILE_AGE_FOR_READ_SECS`: seconds
    /// - `BEACON_QUEUE_CAPACITY`: pending write tasks
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env::var("BEACON_BATCH_SIZE") {
            Ok(value) => Self::for_batch_size(match value.to_lowercase().as_str() {
                "small" => BatchSize::Small,
                "medium" => BatchSize::Medium,
                "large" => BatchSize::Large,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "BEACON_BATCH_SIZE",
                        value,
                    })
                }
            }),
            Err(_) => Self::default(),
        };

        if let Some(size) = env_u64("BEACON_MAX_FILE_SIZE")? {
            config.max_file_size = size;
        }
        if let Some(size) = env_u64("BEACON_MAX_DIRECTORY_SIZE")? {
            config.max_directory_size = size;
        }
        if let Some(secs) = env_u64("BEACON_MAX_FILE_AGE_FOR_READ_SECS")? {
            config.max_file_age_for_read = Duration::from_secs(secs);
        }
        if let Some(capacity) = env_u64("BEACON_QUEUE_CAPACITY")? {
            config.queue_capacity = capacity as usize;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants between thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("max_file_size", self.max_file_size),
            ("max_directory_size", self.max_directory_size),
            ("max_objects_in_file", self.max_objects_in_file),
            ("max_object_size", self.max_object_size),
            ("max_block_length", u64::from(self.max_block_length)),
            ("queue_capacity", self.queue_capacity as u64),
        ];
        if let Some((field, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { field });
        }

        if self.min_file_age_for_read <= self.max_file_age_for_write {
            return Err(ConfigError::OverlappingFileAges {
                write: self.max_file_age_for_write,
                read: self.min_file_age_for_read,
            });
        }
        if self.max_file_age_for_read < self.min_file_age_for_read {
            return Err(ConfigError::ReadWindowInverted {
                min: self.min_file_age_for_read,
                max: self.max_file_age_for_read,
            });
        }
        if self.max_object_size > self.max_file_size {
            return Err(ConfigError::ObjectLargerThanFile {
                object: self.max_object_size,
                file: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Set the maximum file size.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Set the maximum directory size.
    pub fn with_max_directory_size(mut self, bytes: u64) -> Self {
        self.max_directory_size = bytes;
        self
    }

    /// Set the write and read age thresholds.
    pub fn with_file_ages(mut self, max_for_write: Duration, min_for_read: Duration) -> Self {
        self.max_file_age_for_write = max_for_write;
        self.min_file_age_for_read = min_for_read;
        self
    }

    /// Set the age after which unread files are discarded.
    pub fn with_max_file_age_for_read(mut self, age: Duration) -> Self {
        self.max_file_age_for_read = age;
        self
    }

    /// Set the maximum number of events per file.
    pub fn with_max_objects_in_file(mut self, count: u64) -> Self {
        self.max_objects_in_file = count;
        self
    }

    /// Set the maximum encoded event size.
    pub fn with_max_object_size(mut self, bytes: u64) -> Self {
        self.max_object_size = bytes;
        self
    }

    /// Set the write queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

fn env_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}

/// Check that a feature name can be used as a single path component.
pub fn validate_feature_name(name: &str) -> Result<(), ConfigError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(ConfigError::InvalidFeatureName {
            name: name.to_string(),
        });
    }
    Ok(())
}
