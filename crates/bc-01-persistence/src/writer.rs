//! # Writers
//!
//! [`Writer`] is the inbound port instrumentation uses; it never blocks and
//! never fails. [`FileWriter`] is the synchronous worker behind it that turns
//! one event into blocks in the orchestrator-selected file.

use crate::codec::encode_event;
use crate::error::StorageError;
use crate::orchestrator::SharedOrchestrator;
use beacon_telemetry::{EVENTS_DROPPED, EVENTS_WRITTEN};
use serde::Serialize;
use shared_types::Event;

/// Inbound port for recording events.
pub trait Writer: Send + Sync {
    /// Record one event. Failures are logged, never returned.
    fn write(&self, event: Event);

    /// Serialize `value` as JSON and record it.
    fn write_value<T: Serialize>(&self, value: &T)
    where
        Self: Sized,
    {
        match serde_json::to_vec(value) {
            Ok(data) => self.write(Event::new(data)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize event, dropping it");
            }
        }
    }
}

/// Which consent partition a writer feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Authorized,
    Pending,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Authorized => "authorized",
            Bucket::Pending => "pending",
        }
    }
}

/// Appends encoded events to the files of one bucket.
///
/// Runs on the read/write queue thread; the orchestrator lock is held only
/// while the target file is chosen.
#[derive(Debug, Clone)]
pub struct FileWriter {
    feature: String,
    bucket: Bucket,
    orchestrator: SharedOrchestrator,
}

impl FileWriter {
    pub fn new(feature: impl Into<String>, bucket: Bucket, orchestrator: SharedOrchestrator) -> Self {
        Self {
            feature: feature.into(),
            bucket,
            orchestrator,
        }
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn orchestrator(&self) -> &SharedOrchestrator {
        &self.orchestrator
    }

    /// Encode and append one event.
    pub fn write_event(&self, event: &Event) -> Result<(), StorageError> {
        let max_block_length = self.orchestrator.lock().config().max_block_length;
        let bytes = encode_event(event, max_block_length)?;

        // Append under the lock so the reader never selects a file mid-write.
        {
            let mut orchestrator = self.orchestrator.lock();
            let file = orchestrator.writable_file(bytes.len() as u64)?;
            file.append(&bytes)?;
        }

        EVENTS_WRITTEN
            .with_label_values(&[self.feature.as_str(), self.bucket.as_str()])
            .inc();
        Ok(())
    }
}

impl Writer for FileWriter {
    fn write(&self, event: Event) {
        if let Err(e) = self.write_event(&event) {
            let reason = match e {
                StorageError::ObjectTooLarge { .. } | StorageError::Block(_) => "too_large",
                _ => "io_error",
            };
            EVENTS_DROPPED
                .with_label_values(&[self.feature.as_str(), reason])
                .inc();
            tracing::warn!(
                feature = %self.feature,
                bucket = self.bucket.as_str(),
                size = event.data.len(),
                error = %e,
                "Failed to write event, dropping it"
            );
        }
    }
}
