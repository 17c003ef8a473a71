//! # Feature Storage
//!
//! Assembles the storage side of one feature:
//!
//! ```text
//! <root>/<feature>/v1/authorized/   ← uploaded by the DataReader
//! <root>/<feature>/v1/pending/      ← held until consent is decided
//! <root>/data-store-v1/<feature>/   ← DataStore
//! ```

use crate::config::{validate_feature_name, StorageConfig};
use crate::consent_writer::ConsentAwareDataWriter;
use crate::data_store::DataStore;
use crate::directory::Directory;
use crate::error::StorageError;
use crate::orchestrator::{FilesOrchestrator, SharedOrchestrator};
use crate::queue::ReadWriteQueue;
use crate::reader::DataReader;
use crate::writer::{Bucket, FileWriter};
use shared_bus::ConsentProvider;
use shared_types::TimeSource;
use std::path::Path;
use std::sync::Arc;

/// Version segment of the event directory layout.
pub const STORAGE_LAYOUT_VERSION: &str = "v1";

pub struct FeatureStorage {
    feature: String,
    queue: Arc<ReadWriteQueue>,
    writer: Arc<ConsentAwareDataWriter>,
    reader: DataReader,
    authorized: SharedOrchestrator,
    pending: SharedOrchestrator,
    data_store: DataStore,
}

impl FeatureStorage {
    pub fn new(
        root: &Path,
        feature: &str,
        config: StorageConfig,
        consent: Arc<ConsentProvider>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, StorageError> {
        validate_feature_name(feature)?;
        config.validate()?;

        let base = root.join(feature).join(STORAGE_LAYOUT_VERSION);
        let orchestrator = |bucket: Bucket| {
            FilesOrchestrator::new(
                feature,
                Directory::new(base.join(bucket.as_str())),
                config.clone(),
                Arc::clone(&time),
            )
            .shared()
        };
        let authorized = orchestrator(Bucket::Authorized);
        let pending = orchestrator(Bucket::Pending);

        let queue = Arc::new(ReadWriteQueue::new(feature, config.queue_capacity)?);
        let writer = Arc::new(ConsentAwareDataWriter::new(
            feature,
            Arc::clone(&queue),
            FileWriter::new(feature, Bucket::Authorized, Arc::clone(&authorized)),
            FileWriter::new(feature, Bucket::Pending, Arc::clone(&pending)),
            consent,
        ));
        let reader = DataReader::new(feature, Arc::clone(&authorized));
        let data_store = DataStore::new(root, feature, config.max_block_length);

        tracing::info!(feature, path = %base.display(), "Feature storage ready");

        Ok(Self {
            feature: feature.to_string(),
            queue,
            writer,
            reader,
            authorized,
            pending,
            data_store,
        })
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Non-blocking writer for instrumentation.
    pub fn writer(&self) -> Arc<ConsentAwareDataWriter> {
        Arc::clone(&self.writer)
    }

    /// Reader over the authorized bucket.
    pub fn reader(&self) -> DataReader {
        self.reader.clone()
    }

    pub fn data_store(&self) -> &DataStore {
        &self.data_store
    }

    pub fn queue(&self) -> &Arc<ReadWriteQueue> {
        &self.queue
    }

    pub fn authorized_directory(&self) -> Directory {
        self.authorized.lock().directory().clone()
    }

    pub fn pending_directory(&self) -> Directory {
        self.pending.lock().directory().clone()
    }

    /// Wait until every write and migration submitted so far is on disk.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Blocking variant of [`flush`](Self::flush); not for async contexts.
    pub fn flush_blocking(&self) {
        self.queue.flush_blocking();
    }
}

impl std::fmt::Debug for FeatureStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureStorage")
            .field("feature", &self.feature)
            .field("queue", &self.queue)
            .finish()
    }
}
