//! # Versioned Data Store
//!
//! Small per-feature key/value state (e.g. the last uploaded session id)
//! that must survive restarts. One file per key under
//! `<root>/data-store-v1/<feature>/<key>`, holding exactly two blocks:
//!
//! ```text
//! [Version: u16 LE][Data: bytes]
//! ```
//!
//! Writes go to a uniquely named temporary file that is renamed over the
//! key, so a crash leaves either the old or the new value. Sets and removals
//! are serialized across every clone of a store; reads take no lock. The
//! directory is only created by a write; reads and removals on a fresh
//! install touch nothing.

use crate::codec::{Block, BlockError, BlockReader, DataStoreBlockType};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Name of the store directory under the storage root.
pub const DATA_STORE_DIRECTORY: &str = "data-store-v1";

/// Version written when the caller has no versioning scheme.
pub const DEFAULT_DATA_STORE_VERSION: u16 = 0;

#[derive(Debug, Error)]
pub enum DataStoreError {
    #[error("invalid data store key {key:?}")]
    InvalidKey { key: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupted value for key {key:?}: {reason}")]
    Corrupted { key: String, reason: String },

    #[error("failed to encode value: {0}")]
    Encoding(#[from] BlockError),
}

/// A value read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub version: u16,
    pub data: Vec<u8>,
}

impl StoredValue {
    /// The data, if it was written with `version`.
    pub fn data_for_version(&self, version: u16) -> Option<&[u8]> {
        (self.version == version).then_some(self.data.as_slice())
    }
}

#[derive(Debug, Clone)]
pub struct DataStore {
    feature: String,
    directory: PathBuf,
    max_block_length: u32,
    mutations: Arc<Mutex<()>>,
}

impl DataStore {
    pub fn new(root: &Path, feature: impl Into<String>, max_block_length: u32) -> Self {
        let feature = feature.into();
        let directory = root.join(DATA_STORE_DIRECTORY).join(&feature);
        Self {
            feature,
            directory,
            max_block_length,
            mutations: Arc::new(Mutex::new(())),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Store `data` under `key`, replacing any previous value.
    pub fn set_value(&self, key: &str, data: &[u8], version: u16) -> Result<(), DataStoreError> {
        let path = self.key_path(key)?;

        let mut bytes = Block::new(DataStoreBlockType::Version, version.to_le_bytes())
            .serialize(self.max_block_length)?;
        bytes.extend(Block::new(DataStoreBlockType::Data, data).serialize(self.max_block_length)?);

        let _guard = self.mutations.lock();
        fs::create_dir_all(&self.directory).map_err(|e| io_error(&self.directory, e))?;

        // Temp names start with '.', which no key may.
        let mut file =
            NamedTempFile::new_in(&self.directory).map_err(|e| io_error(&self.directory, e))?;
        file.write_all(&bytes).map_err(|e| io_error(file.path(), e))?;
        file.as_file().sync_all().map_err(|e| io_error(file.path(), e))?;
        file.persist(&path).map_err(|e| io_error(&path, e.error))?;

        tracing::trace!(feature = %self.feature, key, version, "Stored value");
        Ok(())
    }

    /// Read the value under `key`. `Ok(None)` when nothing is stored.
    pub fn value(&self, key: &str) -> Result<Option<StoredValue>, DataStoreError> {
        let path = self.key_path(key)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let blocks = BlockReader::<_, DataStoreBlockType>::new(io::BufReader::new(file))
            .with_max_length(self.max_block_length)
            .all()
            .map_err(|e| match e {
                BlockError::Io(source) => io_error(&path, source),
                other => corrupted(key, other.to_string()),
            })?;

        let [version, data] = blocks.as_slice() else {
            return Err(corrupted(key, format!("expected 2 blocks, found {}", blocks.len())));
        };
        if version.kind != DataStoreBlockType::Version || data.kind != DataStoreBlockType::Data {
            return Err(corrupted(key, "blocks out of order".to_string()));
        }
        let version: [u8; 2] = version
            .data
            .as_slice()
            .try_into()
            .map_err(|_| corrupted(key, format!("version block of {} bytes", version.data.len())))?;

        Ok(Some(StoredValue {
            version: u16::from_le_bytes(version),
            data: data.data.clone(),
        }))
    }

    /// Remove the value under `key`. Removing a missing key is not an error.
    pub fn remove_value(&self, key: &str) -> Result<(), DataStoreError> {
        let path = self.key_path(key)?;
        let _guard = self.mutations.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, DataStoreError> {
        let invalid = key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\'])
            || key.contains('\0');
        if invalid {
            return Err(DataStoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.directory.join(key))
    }
}

fn io_error(path: &Path, source: io::Error) -> DataStoreError {
    DataStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn corrupted(key: &str, reason: String) -> DataStoreError {
    DataStoreError::Corrupted {
        key: key.to_string(),
        reason,
    }
}
