//! # Feature Pipeline
//!
//! One feature, end to end:
//!
//! ```text
//! writer() ──→ FeatureStorage ──(authorized files)──→ DataUploadWorker ──→ DataUploader
//!                   ↑
//!         ConsentProvider (set_consent)
//! ```

use crate::config::{RuntimeConfig, RuntimeError};
use bc_01_persistence::{ConsentAwareDataWriter, DataStore, FeatureStorage, StorageConfig};
use bc_02_upload::{
    DataUploadWorker, DataUploader, HttpDataUploader, UploadConditions, UploadConfig,
    UploadWorkerHandle, WorkerState,
};
use shared_bus::ConsentProvider;
use shared_types::{SystemTimeSource, TimeSource, TrackingConsent};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

pub struct FeaturePipeline {
    storage: FeatureStorage,
    consent: Arc<ConsentProvider>,
    worker: UploadWorkerHandle,
}

impl FeaturePipeline {
    /// Build storage and an HTTP uploader from `config` and start the worker.
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let uploader = HttpDataUploader::new(config.uploader.clone(), config.upload.request_timeout)?;
        let conditions =
            UploadConditions::new(config.upload.min_battery_level, config.upload.min_connectivity);

        Self::start(
            &config.storage_dir,
            &config.feature,
            config.storage.clone(),
            &config.upload,
            Arc::new(uploader),
            conditions,
            ConsentProvider::new(config.initial_consent),
            Arc::new(SystemTimeSource),
        )
    }

    /// Assemble a pipeline from its parts and start the worker.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        root: &Path,
        feature: &str,
        storage_config: StorageConfig,
        upload_config: &UploadConfig,
        uploader: Arc<dyn DataUploader>,
        conditions: UploadConditions,
        consent: Arc<ConsentProvider>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, RuntimeError> {
        upload_config.validate()?;
        let storage =
            FeatureStorage::new(root, feature, storage_config, Arc::clone(&consent), time)?;
        let worker = DataUploadWorker::new(
            feature,
            storage.reader(),
            uploader,
            conditions,
            upload_config,
        )
        .spawn();

        tracing::info!(
            feature,
            consent = %consent.current(),
            "Feature pipeline started"
        );

        Ok(Self {
            storage,
            consent,
            worker,
        })
    }

    pub fn feature(&self) -> &str {
        self.storage.feature()
    }

    pub fn writer(&self) -> Arc<ConsentAwareDataWriter> {
        self.storage.writer()
    }

    pub fn storage(&self) -> &FeatureStorage {
        &self.storage
    }

    pub fn data_store(&self) -> &DataStore {
        self.storage.data_store()
    }

    pub fn consent(&self) -> TrackingConsent {
        self.consent.current()
    }

    /// Returns `false` when `consent` is already current.
    pub fn set_consent(&self, consent: TrackingConsent) -> bool {
        self.consent.change_consent(consent)
    }

    pub fn worker_state(&self) -> watch::Receiver<WorkerState> {
        self.worker.state()
    }

    /// Wait until every submitted write is on disk.
    pub async fn flush(&self) {
        self.storage.flush().await;
    }

    /// Flush writes, then upload everything authorized right away.
    pub async fn flush_all(&self) -> usize {
        self.flush().await;
        self.worker.flush_all().await
    }

    /// Flush pending writes and stop the worker. Files left on disk are
    /// picked up on the next start.
    pub async fn shutdown(self) {
        tracing::info!(feature = %self.feature(), "Shutting down feature pipeline");
        self.storage.flush().await;
        self.worker.cancel().await;
    }
}
