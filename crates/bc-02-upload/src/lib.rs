//! # Event Upload (bc-02)
//!
//! Moves persisted batches to an intake endpoint.
//!
//! ## Architecture
//!
//! ```text
//! DataReader ──next_batch()──→ DataUploadWorker ──upload(&[Event])──→ DataUploader
//!      ↑                          │    ↑                                  │
//!      └── mark_as_read(outcome) ─┘    └────────── UploadStatus ──────────┘
//!                                 │
//!                          UploadConditions (battery, network)
//!                          UploadDelay (initial / min / max, backoff)
//! ```
//!
//! ## Status Handling
//!
//! | Status | Batch | Next delay |
//! |--------|-------|------------|
//! | 2xx | deleted (delivered) | min |
//! | 3xx, 4xx | deleted (rejected) | min |
//! | 5xx, network error, unknown | kept | grows toward max |
//! | no batch | - | initial |
//! | gate denies | kept | unchanged |

pub mod conditions;
pub mod config;
pub mod delay;
pub mod status;
pub mod uploader;
pub mod worker;

pub use conditions::{
    BatteryState, BatteryStatus, BatteryStatusProvider, ConnectivityTier, NetworkInfo,
    NetworkInfoProvider, Reachability, UploadBlocker, UploadConditions,
};
pub use config::{
    BatchProcessingLevel, HttpUploaderConfig, PayloadFormat, UploadConfig, UploadError,
    UploadFrequency,
};
pub use delay::UploadDelay;
pub use status::UploadStatus;
pub use uploader::{DataUploader, HttpDataUploader};
pub use worker::{CycleReport, DataUploadWorker, UploadWorkerHandle, WorkerState};
