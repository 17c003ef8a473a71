//! # Event Files
//!
//! An event file is an append-only sequence of blocks whose name is its
//! creation time in decimal milliseconds since the Unix epoch. The name is
//! the only metadata the orchestrator relies on: age and read order are both
//! derived from it.

use crate::error::FileError;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Handle to one event file.
///
/// The handle does not keep the file open; every operation opens it anew and
/// fails with [`FileError::NotFound`] if it was deleted in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFile {
    path: PathBuf,
    name: String,
    creation_millis: u64,
}

impl EventFile {
    /// Build a handle from a path whose file name is a millisecond
    /// timestamp. Returns `None` for any other name.
    pub(crate) fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        let creation_millis = parse_file_name(&name)?;
        Some(Self {
            path,
            name,
            creation_millis,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creation time encoded in the name.
    pub fn creation_millis(&self) -> u64 {
        self.creation_millis
    }

    /// Age relative to `now_millis`; zero for names in the future.
    pub fn age_millis(&self, now_millis: u64) -> u64 {
        now_millis.saturating_sub(self.creation_millis)
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Append bytes at the end of the file. The file must exist.
    pub fn append(&self, data: &[u8]) -> Result<(), FileError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| FileError::from_io(&self.path, e))?;
        file.write_all(data)
            .and_then(|_| file.flush())
            .map_err(|e| FileError::from_io(&self.path, e))
    }

    /// Read the whole file.
    pub fn read(&self) -> Result<Vec<u8>, FileError> {
        let mut bytes = Vec::new();
        self.reader()?
            .read_to_end(&mut bytes)
            .map_err(|e| FileError::from_io(&self.path, e))?;
        Ok(bytes)
    }

    /// Buffered stream over the file contents.
    pub fn reader(&self) -> Result<BufReader<File>, FileError> {
        File::open(&self.path)
            .map(BufReader::new)
            .map_err(|e| FileError::from_io(&self.path, e))
    }

    /// Current size in bytes.
    pub fn size(&self) -> Result<u64, FileError> {
        fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| FileError::from_io(&self.path, e))
    }

    pub fn delete(&self) -> Result<(), FileError> {
        fs::remove_file(&self.path).map_err(|e| FileError::from_io(&self.path, e))
    }
}

/// Parse an event file name. Only plain decimal digits are accepted, so
/// temporary or foreign files in the directory are ignored.
pub(crate) fn parse_file_name(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}
