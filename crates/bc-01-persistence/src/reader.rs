//! # Reader
//!
//! Turns the oldest eligible file of the authorized bucket into a [`Batch`]
//! and deletes it once the upload outcome is terminal.

use crate::codec::{decode_events, BlockError};
use crate::file::EventFile;
use crate::orchestrator::{DeletionReason, SharedOrchestrator};
use shared_types::Event;

/// Events of one file, in file order, plus the handle to that file.
#[derive(Debug, Clone)]
pub struct Batch {
    pub events: Vec<Event>,
    file: EventFile,
}

impl Batch {
    pub fn file_name(&self) -> &str {
        self.file.name()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// What to do with a batch after an upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Accepted by the collector; delete.
    Delivered,
    /// Refused with a terminal status; delete.
    Rejected,
    /// Transient failure; keep for the next cycle.
    Retry,
}

#[derive(Debug, Clone)]
pub struct DataReader {
    feature: String,
    orchestrator: SharedOrchestrator,
}

impl DataReader {
    pub fn new(feature: impl Into<String>, orchestrator: SharedOrchestrator) -> Self {
        Self {
            feature: feature.into(),
            orchestrator,
        }
    }

    /// Next batch to upload, or `None` if no file is eligible.
    ///
    /// Empty and undecodable files are deleted and skipped. A file that is
    /// corrupt part-way yields the events before the corruption. I/O errors
    /// end the attempt; the file is left for a later cycle.
    pub fn next_batch(&self) -> Option<Batch> {
        loop {
            let (file, max_block_length) = {
                let mut orchestrator = self.orchestrator.lock();
                let max_block_length = orchestrator.config().max_block_length;
                match orchestrator.readable_file() {
                    Ok(Some(file)) => (file, max_block_length),
                    Ok(None) => return None,
                    Err(e) => {
                        tracing::warn!(feature = %self.feature, error = %e, "Cannot list readable files");
                        return None;
                    }
                }
            };

            let input = match file.reader() {
                Ok(input) => input,
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    tracing::warn!(feature = %self.feature, error = %e, "Cannot open event file");
                    return None;
                }
            };

            let decoded = decode_events(input, max_block_length);
            match &decoded.error {
                Some(BlockError::Io(e)) => {
                    tracing::warn!(
                        feature = %self.feature,
                        file = %file.name(),
                        error = %e,
                        "I/O error while reading event file"
                    );
                    return None;
                }
                Some(e) => {
                    tracing::warn!(
                        feature = %self.feature,
                        file = %file.name(),
                        events = decoded.events.len(),
                        error = %e,
                        "Corrupted event file"
                    );
                }
                None => {}
            }

            if decoded.events.is_empty() {
                let reason = if decoded.error.is_some() {
                    DeletionReason::Corrupted
                } else {
                    DeletionReason::Empty
                };
                if self.delete(&file, reason).is_err() {
                    return None;
                }
                continue;
            }

            return Some(Batch {
                events: decoded.events,
                file,
            });
        }
    }

    /// Report the outcome of an upload attempt. Terminal outcomes delete the
    /// batch's file.
    pub fn mark_as_read(&self, batch: &Batch, outcome: BatchOutcome) {
        let reason = match outcome {
            BatchOutcome::Delivered => DeletionReason::Delivered,
            BatchOutcome::Rejected => DeletionReason::Rejected,
            BatchOutcome::Retry => return,
        };
        let _ = self.delete(&batch.file, reason);
    }

    /// Delete a batch's file unconditionally. Returns `false` when the file
    /// could not be removed.
    pub fn discard(&self, batch: &Batch, reason: DeletionReason) -> bool {
        self.delete(&batch.file, reason).is_ok()
    }

    /// Prepare for a forced flush: close the current file for writing and
    /// read without waiting for files to settle, until
    /// [`end_flush`](Self::end_flush).
    pub fn begin_flush(&self) {
        let mut orchestrator = self.orchestrator.lock();
        orchestrator.reset();
        orchestrator.set_ignore_file_age_when_reading(true);
    }

    pub fn end_flush(&self) {
        self.orchestrator
            .lock()
            .set_ignore_file_age_when_reading(false);
    }

    fn delete(&self, file: &EventFile, reason: DeletionReason) -> Result<(), crate::error::FileError> {
        match self.orchestrator.lock().delete(file, reason) {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}
