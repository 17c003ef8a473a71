//! # Files Orchestrator
//!
//! Decides which file the writer appends to and which file the reader
//! consumes next, for one bucket directory.
//!
//! ## Write Side
//!
//! The last writable file is reused while all of these hold:
//!
//! | Check | Threshold |
//! |-------|-----------|
//! | file still exists | - |
//! | age | `<= max_file_age_for_write` |
//! | size after write | `<= max_file_size` |
//! | events after write | `<= max_objects_in_file` |
//!
//! Otherwise a new file is created, after purging the oldest files if the
//! directory grew above `max_directory_size`.
//!
//! ## Read Side
//!
//! Files older than `max_file_age_for_read` are deleted unread. Of the
//! remaining files, the oldest one that is not the current writable file is
//! returned once it is at least `min_file_age_for_read` old.

use crate::config::StorageConfig;
use crate::directory::Directory;
use crate::error::{FileError, StorageError};
use crate::file::EventFile;
use beacon_telemetry::FILES_DELETED;
use parking_lot::Mutex;
use shared_types::TimeSource;
use std::fmt;
use std::sync::Arc;

/// Orchestrator shared by the read/write queue thread and the upload task.
pub type SharedOrchestrator = Arc<Mutex<FilesOrchestrator>>;

/// Why a file was deleted. Recorded in logs and the `files_deleted` metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionReason {
    /// Batch accepted by the collector.
    Delivered,
    /// Batch refused by the collector with a terminal status.
    Rejected,
    /// Older than `max_file_age_for_read`.
    Obsolete,
    /// Removed to bring the directory under `max_directory_size`.
    Purged,
    /// No event could be decoded from it.
    Corrupted,
    /// Contained no bytes.
    Empty,
    /// Sent during a forced flush.
    Flushed,
}

impl DeletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionReason::Delivered => "delivered",
            DeletionReason::Rejected => "rejected",
            DeletionReason::Obsolete => "obsolete",
            DeletionReason::Purged => "purged",
            DeletionReason::Corrupted => "corrupted",
            DeletionReason::Empty => "empty",
            DeletionReason::Flushed => "flushed",
        }
    }
}

impl fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct WritableFile {
    file: EventFile,
    objects: u64,
}

pub struct FilesOrchestrator {
    feature: String,
    directory: Directory,
    config: StorageConfig,
    time: Arc<dyn TimeSource>,
    last_writable: Option<WritableFile>,
    ignore_file_age_when_reading: bool,
}

impl FilesOrchestrator {
    pub fn new(
        feature: impl Into<String>,
        directory: Directory,
        config: StorageConfig,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            feature: feature.into(),
            directory,
            config,
            time,
            last_writable: None,
            ignore_file_age_when_reading: false,
        }
    }

    /// Wrap in the shared handle used across threads.
    pub fn shared(self) -> SharedOrchestrator {
        Arc::new(Mutex::new(self))
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Name of the file currently receiving writes, if any.
    pub fn current_writable_file(&self) -> Option<&str> {
        self.last_writable.as_ref().map(|w| w.file.name())
    }

    /// Read files regardless of `min_file_age_for_read`. The current
    /// writable file stays excluded.
    pub fn set_ignore_file_age_when_reading(&mut self, ignore: bool) {
        self.ignore_file_age_when_reading = ignore;
    }

    /// Forget the last writable file so the next write opens a new one.
    pub fn reset(&mut self) {
        self.last_writable = None;
    }

    // =========================================================================
    // WRITE SIDE
    // =========================================================================

    /// File the next `write_size` bytes (one event) should be appended to.
    pub fn writable_file(&mut self, write_size: u64) -> Result<EventFile, StorageError> {
        if write_size > self.config.max_object_size {
            return Err(StorageError::ObjectTooLarge {
                size: write_size,
                max: self.config.max_object_size,
            });
        }

        let now = self.time.now_millis();
        if let Some(writable) = self.last_writable.as_mut() {
            if can_reuse(writable, write_size, now, &self.config) {
                writable.objects += 1;
                return Ok(writable.file.clone());
            }
        }

        let file = self.create_writable_file(now)?;
        self.last_writable = Some(WritableFile {
            file: file.clone(),
            objects: 1,
        });
        Ok(file)
    }

    fn create_writable_file(&mut self, now: u64) -> Result<EventFile, FileError> {
        self.directory.create_if_needed()?;
        self.purge_if_needed();

        // Names must sort after every existing file even when the clock
        // stalls or steps back, or FIFO order breaks.
        let after_newest = self
            .directory
            .files()?
            .last()
            .map_or(0, |newest| newest.creation_millis() + 1);
        let name = self.directory.next_free_name(now.max(after_newest));
        let file = self.directory.create_file(name)?;
        tracing::debug!(
            feature = %self.feature,
            file = %file.name(),
            "Created event file"
        );
        Ok(file)
    }

    /// Delete oldest files until the directory fits `max_directory_size`.
    fn purge_if_needed(&mut self) {
        let files = match self.directory.files() {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(feature = %self.feature, error = %e, "Cannot list files for purge");
                return;
            }
        };

        let sizes: Vec<(EventFile, u64)> = files
            .into_iter()
            .filter_map(|f| f.size().ok().map(|size| (f, size)))
            .collect();
        let mut total: u64 = sizes.iter().map(|(_, size)| size).sum();
        if total <= self.config.max_directory_size {
            return;
        }

        tracing::warn!(
            feature = %self.feature,
            total_bytes = total,
            max_bytes = self.config.max_directory_size,
            "Directory size above limit, purging oldest files"
        );
        for (file, size) in sizes {
            if total <= self.config.max_directory_size {
                break;
            }
            if self.delete(&file, DeletionReason::Purged).is_ok() {
                total = total.saturating_sub(size);
            }
        }
    }

    // =========================================================================
    // READ SIDE
    // =========================================================================

    /// Oldest file eligible for upload, deleting obsolete files on the way.
    pub fn readable_file(&mut self) -> Result<Option<EventFile>, FileError> {
        let now = self.time.now_millis();
        let max_age = self.config.max_file_age_for_read.as_millis() as u64;
        let min_age = self.config.min_file_age_for_read.as_millis() as u64;
        let write_age = self.config.max_file_age_for_write.as_millis() as u64;
        let current = self.current_writable_file().map(str::to_string);

        let mut oldest = None;
        for file in self.directory.files()? {
            if file.age_millis(now) > max_age {
                let _ = self.delete(&file, DeletionReason::Obsolete);
                continue;
            }
            if current.as_deref() == Some(file.name()) {
                if file.age_millis(now) <= write_age {
                    continue;
                }
                // Too old to take more writes: seal it so it can be read.
                self.last_writable = None;
            }
            if oldest.is_none() {
                oldest = Some(file);
            }
        }

        Ok(oldest.filter(|file| {
            self.ignore_file_age_when_reading || file.age_millis(now) >= min_age
        }))
    }

    /// Delete a file and record why.
    pub fn delete(&mut self, file: &EventFile, reason: DeletionReason) -> Result<(), FileError> {
        if self.current_writable_file() == Some(file.name()) {
            self.last_writable = None;
        }

        match file.delete() {
            Ok(()) => {
                FILES_DELETED
                    .with_label_values(&[self.feature.as_str(), reason.as_str()])
                    .inc();
                tracing::debug!(
                    feature = %self.feature,
                    file = %file.name(),
                    reason = %reason,
                    "Deleted event file"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    feature = %self.feature,
                    file = %file.name(),
                    reason = %reason,
                    error = %e,
                    "Failed to delete event file"
                );
                Err(e)
            }
        }
    }
}

fn can_reuse(writable: &WritableFile, write_size: u64, now: u64, config: &StorageConfig) -> bool {
    if writable.file.age_millis(now) > config.max_file_age_for_write.as_millis() as u64 {
        return false;
    }
    if writable.objects + 1 > config.max_objects_in_file {
        return false;
    }
    match writable.file.size() {
        Ok(size) => size + write_size <= config.max_file_size,
        Err(_) => false,
    }
}

impl fmt::Debug for FilesOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilesOrchestrator")
            .field("feature", &self.feature)
            .field("directory", &self.directory.path())
            .field("last_writable", &self.last_writable)
            .finish()
    }
}
