//! Shared fixtures for integration tests.

use async_trait::async_trait;
use bc_01_persistence::{
    decode_events, Directory, FeatureStorage, StorageConfig, Writer, DEFAULT_MAX_BLOCK_LENGTH,
};
use bc_02_upload::{DataUploadWorker, DataUploader, UploadConditions, UploadConfig, UploadStatus};
use parking_lot::Mutex;
use shared_bus::ConsentProvider;
use shared_types::{Event, ManualTimeSource, TrackingConsent};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const START_MILLIS: u64 = 1_700_000_000_000;

/// Write age 1s, read age 2s, everything else at defaults.
pub fn test_config() -> StorageConfig {
    StorageConfig::default().with_file_ages(Duration::from_secs(1), Duration::from_secs(2))
}

/// Upload config whose timers never fire during a test.
pub fn manual_upload_config() -> UploadConfig {
    let hour = Duration::from_secs(3_600);
    UploadConfig::default().with_delays(hour, hour, hour)
}

// =============================================================================
// Scripted uploader
// =============================================================================

/// Answers with scripted statuses, then `202` forever, recording every batch.
#[derive(Default)]
pub struct ScriptedUploader {
    script: Mutex<VecDeque<UploadStatus>>,
    received: Mutex<Vec<Vec<Event>>>,
}

impl ScriptedUploader {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(statuses: impl IntoIterator<Item = UploadStatus>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(statuses.into_iter().collect()),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.received.lock().len()
    }

    /// Payloads of every event received, in arrival order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.received
            .lock()
            .iter()
            .flatten()
            .map(|event| event.data.clone())
            .collect()
    }
}

#[async_trait]
impl DataUploader for ScriptedUploader {
    async fn upload(&self, events: &[Event]) -> UploadStatus {
        self.received.lock().push(events.to_vec());
        self.script
            .lock()
            .pop_front()
            .unwrap_or(UploadStatus::Success { code: 202 })
    }
}

// =============================================================================
// Storage harness
// =============================================================================

/// One feature's storage on a manual clock.
pub struct Harness {
    pub storage: FeatureStorage,
    pub consent: Arc<ConsentProvider>,
    pub clock: ManualTimeSource,
}

impl Harness {
    pub fn new(root: &Path, consent: TrackingConsent, config: StorageConfig) -> Self {
        let clock = ManualTimeSource::new(START_MILLIS);
        let consent = ConsentProvider::new(consent);
        let storage = FeatureStorage::new(
            root,
            "logs",
            config,
            Arc::clone(&consent),
            Arc::new(clock.clone()),
        )
        .expect("storage should build");
        Self {
            storage,
            consent,
            clock,
        }
    }

    pub fn write(&self, payload: impl Into<Vec<u8>>) {
        self.storage.writer().write(Event::new(payload));
    }

    /// Move the clock past `min_file_age_for_read` of [`test_config`].
    pub fn age_files(&self) {
        self.clock.advance(Duration::from_secs(3));
    }

    pub fn worker(&self, uploader: Arc<ScriptedUploader>, config: &UploadConfig) -> DataUploadWorker {
        DataUploadWorker::new(
            "logs",
            self.storage.reader(),
            uploader,
            UploadConditions::default(),
            config,
        )
    }

    pub fn authorized_payloads(&self) -> Vec<Vec<u8>> {
        payloads_on_disk(&self.storage.authorized_directory())
    }

    pub fn pending_payloads(&self) -> Vec<Vec<u8>> {
        payloads_on_disk(&self.storage.pending_directory())
    }
}

/// Decode every file of `directory`, oldest first.
pub fn payloads_on_disk(directory: &Directory) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    for file in directory.files().expect("directory should list") {
        let decoded = decode_events(
            file.reader().expect("file should open"),
            DEFAULT_MAX_BLOCK_LENGTH,
        );
        assert!(decoded.error.is_none(), "file {} is corrupted", file.name());
        payloads.extend(decoded.events.into_iter().map(|event| event.data));
    }
    payloads
}

pub fn numbered(prefix: &str, count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("{prefix}-{i:04}").into_bytes())
        .collect()
}
