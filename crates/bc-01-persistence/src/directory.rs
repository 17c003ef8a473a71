//! # Directories
//!
//! A [`Directory`] owns one flat folder of event files. A missing folder is
//! a normal state (nothing written yet, or wiped by the host): listing it
//! yields no files and only the write path recreates it.

use crate::error::FileError;
use crate::file::EventFile;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    path: PathBuf,
}

impl Directory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn create_if_needed(&self) -> Result<(), FileError> {
        fs::create_dir_all(&self.path).map_err(|e| FileError::from_io(&self.path, e))
    }

    /// Event files in the directory, oldest first. Empty when the directory
    /// does not exist.
    pub fn files(&self) -> Result<Vec<EventFile>, FileError> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FileError::from_io(&self.path, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FileError::from_io(&self.path, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(file) = EventFile::from_path(entry.path()) {
                files.push(file);
            }
        }
        files.sort_by_key(EventFile::creation_millis);
        Ok(files)
    }

    /// Create a new empty file named after `creation_millis`. Fails with
    /// [`FileError::AlreadyExists`] rather than reusing a taken name.
    pub fn create_file(&self, creation_millis: u64) -> Result<EventFile, FileError> {
        self.create_if_needed()?;
        let path = self.path.join(creation_millis.to_string());
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| FileError::from_io(&path, e))?;
        EventFile::from_path(path.clone()).ok_or(FileError::NotFound { path })
    }

    /// Handle to an existing event file.
    pub fn file(&self, name: &str) -> Result<EventFile, FileError> {
        let path = self.path.join(name);
        if !path.is_file() {
            return Err(FileError::NotFound { path });
        }
        EventFile::from_path(path.clone()).ok_or(FileError::NotFound { path })
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.path.join(name).is_file()
    }

    /// First free file name at or after `millis`.
    pub fn next_free_name(&self, millis: u64) -> u64 {
        let mut candidate = millis;
        while self.has_file(&candidate.to_string()) {
            candidate += 1;
        }
        candidate
    }

    /// Move every event file into `destination`, keeping names unless taken
    /// there, in which case the timestamp is bumped until free. Returns the
    /// number of files moved.
    pub fn move_all_files(&self, destination: &Directory) -> Result<usize, FileError> {
        let files = self.files()?;
        if files.is_empty() {
            return Ok(0);
        }
        destination.create_if_needed()?;

        for file in &files {
            let name = destination.next_free_name(file.creation_millis());
            let target = destination.path.join(name.to_string());
            fs::rename(file.path(), &target).map_err(|e| FileError::from_io(file.path(), e))?;
        }
        Ok(files.len())
    }

    /// Delete every event file. Returns the number of files deleted.
    pub fn delete_all_files(&self) -> Result<usize, FileError> {
        let files = self.files()?;
        for file in &files {
            match file.delete() {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(files.len())
    }

    /// Sum of event file sizes.
    pub fn total_size(&self) -> Result<u64, FileError> {
        let mut total = 0;
        for file in self.files()? {
            match file.size() {
                Ok(size) => total += size,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_lists_nothing() {
        let root = TempDir::new().unwrap();
        let dir = Directory::new(root.path().join("absent"));

        assert!(dir.files().unwrap().is_empty());
        assert_eq!(dir.delete_all_files().unwrap(), 0);
        assert_eq!(dir.total_size().unwrap(), 0);
        assert!(!dir.exists());
    }

    #[test]
    fn test_files_sorted_by_timestamp_not_lexically() {
        let root = TempDir::new().unwrap();
        let dir = Directory::new(root.path());
        for millis in [100, 9, 1000] {
            dir.create_file(millis).unwrap();
        }
        fs::write(root.path().join("notes.txt"), b"ignored").unwrap();

        let names: Vec<u64> = dir.files().unwrap().iter().map(|f| f.creation_millis()).collect();
        assert_eq!(names, vec![9, 100, 1000]);
    }

    #[test]
    fn test_create_file_never_reuses_names() {
        let root = TempDir::new().unwrap();
        let dir = Directory::new(root.path().join("bucket"));

        let file = dir.create_file(42).unwrap();
        assert_eq!(file.name(), "42");
        assert!(matches!(dir.create_file(42), Err(FileError::AlreadyExists { .. })));
        assert_eq!(dir.next_free_name(42), 43);
    }

    #[test]
    fn test_move_all_files_bumps_colliding_names() {
        let root = TempDir::new().unwrap();
        let from = Directory::new(root.path().join("pending"));
        let to = Directory::new(root.path().join("authorized"));

        from.create_file(10).unwrap().append(b"pending-10").unwrap();
        from.create_file(20).unwrap().append(b"pending-20").unwrap();
        to.create_file(10).unwrap().append(b"authorized-10").unwrap();

        assert_eq!(from.move_all_files(&to).unwrap(), 2);
        assert!(from.files().unwrap().is_empty());

        let moved = to.files().unwrap();
        let names: Vec<&str> = moved.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["10", "11", "20"]);
        assert_eq!(to.file("10").unwrap().read().unwrap(), b"authorized-10");
        assert_eq!(to.file("11").unwrap().read().unwrap(), b"pending-10");
    }

    #[test]
    fn test_file_lookup() {
        let root = TempDir::new().unwrap();
        let dir = Directory::new(root.path());
        dir.create_file(5).unwrap();

        assert!(dir.has_file("5"));
        assert!(dir.file("5").is_ok());
        assert!(dir.file("6").unwrap_err().is_not_found());
    }
}
