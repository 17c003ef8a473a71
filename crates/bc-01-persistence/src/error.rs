//! # Storage Errors
//!
//! File operations never panic: every failure on a missing or unreadable
//! file surfaces as a [`FileError`] carrying the path. Callers on the
//! read/write queue and the upload task log these and carry on.

use crate::codec::BlockError;
use crate::config::ConfigError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from file and directory operations.
#[derive(Debug, Error)]
pub enum FileError {
    /// The file or directory does not exist (anymore).
    #[error("no such file or directory: {path}")]
    NotFound { path: PathBuf },

    /// A file name already taken in the directory.
    #[error("file already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Any other I/O failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => FileError::NotFound { path },
            io::ErrorKind::AlreadyExists => FileError::AlreadyExists { path },
            _ => FileError::Io { path, source },
        }
    }

    /// Path the failed operation was applied to.
    pub fn path(&self) -> &Path {
        match self {
            FileError::NotFound { path }
            | FileError::AlreadyExists { path }
            | FileError::Io { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FileError::NotFound { .. })
    }
}

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Encoded event above `max_object_size`.
    #[error("object of {size} bytes exceeds the maximum object size of {max} bytes")]
    ObjectTooLarge { size: u64, max: u64 },

    #[error("failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to start the read/write queue thread: {0}")]
    QueueSpawn(#[source] io::Error),
}
