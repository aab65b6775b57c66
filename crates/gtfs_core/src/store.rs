//! Flat data-file store.
//!
//! Data files are raw byte arrays of exactly their declared length,
//! created zero-filled and extended zero-filled when reopened with a
//! larger length. All range I/O is bounds-checked against the on-disk
//! size.

use crate::dir::{self, LOCK_FILE_NAME, LOG_FILE_NAME};
use crate::error::{GtfsError, GtfsResult};
use gtfs_storage::{FileBackend, StorageBackend};
use std::fs;
use std::path::PathBuf;

/// Manages the fixed-length flat data files of one store directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates a file store rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the path of a data file.
    #[must_use]
    pub fn data_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Returns whether the named data file exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.data_path(name).is_file()
    }

    /// Returns the on-disk size of the named data file.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` when the file is absent.
    pub fn file_len(&self, name: &str) -> GtfsResult<u64> {
        let path = self.data_path(name);
        if !path.is_file() {
            return Err(GtfsError::not_found(name));
        }
        Ok(fs::metadata(path)?.len())
    }

    /// Creates the named file zero-filled to `length`, or extends an
    /// existing file with zero bytes up to `length`.
    ///
    /// # Errors
    ///
    /// Fails with `ShrinkNotAllowed` when the file exists and is larger
    /// than `length`.
    pub fn create_or_extend(&self, name: &str, length: u64) -> GtfsResult<()> {
        let path = self.data_path(name);
        let existed = path.is_file();

        if existed {
            let existing = fs::metadata(&path)?.len();
            if existing > length {
                return Err(GtfsError::ShrinkNotAllowed {
                    filename: name.to_string(),
                    existing,
                    requested: length,
                });
            }
            if existing < length {
                let mut backend = FileBackend::open(&path)?;
                backend.extend(length)?;
            }
        } else {
            let mut backend = FileBackend::open(&path)?;
            backend.extend(length)?;
            dir::sync_directory(&self.root)?;
        }

        Ok(())
    }

    /// Reads `length` bytes at `offset` from the named data file.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` when the file is absent and with a storage
    /// error when the range exceeds the on-disk size.
    pub fn read_range(&self, name: &str, offset: u64, length: u64) -> GtfsResult<Vec<u8>> {
        let path = self.data_path(name);
        if !path.is_file() {
            return Err(GtfsError::not_found(name));
        }
        let backend = FileBackend::open_read_only(&path)?;
        Ok(backend.read_at(offset, length as usize)?)
    }

    /// Writes `data` positionally at `offset` into the named data file.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` when the file is absent and with a storage
    /// error when the range exceeds the on-disk size.
    pub fn write_range(&self, name: &str, offset: u64, data: &[u8]) -> GtfsResult<()> {
        let path = self.data_path(name);
        if !path.is_file() {
            return Err(GtfsError::not_found(name));
        }
        let mut backend = FileBackend::open(&path)?;
        backend.write_at(offset, data)?;
        backend.flush()?;
        Ok(())
    }

    /// Deletes the named data file.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` when the file is absent.
    pub fn remove(&self, name: &str) -> GtfsResult<()> {
        let path = self.data_path(name);
        if !path.is_file() {
            return Err(GtfsError::not_found(name));
        }
        fs::remove_file(&path)?;
        dir::sync_directory(&self.root)?;
        Ok(())
    }

    /// Deletes the named data file if present.
    ///
    /// Recovery replays removals idempotently; a missing file is fine.
    /// Returns whether a file was deleted.
    pub fn remove_if_exists(&self, name: &str) -> GtfsResult<bool> {
        let path = self.data_path(name);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        dir::sync_directory(&self.root)?;
        Ok(true)
    }

    /// Counts the data files in the store directory.
    ///
    /// The log and lock files are excluded (`read_dir` already skips `.`
    /// and `..`).
    pub fn count_data_files(&self) -> GtfsResult<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if name == LOG_FILE_NAME || name == LOCK_FILE_NAME {
                continue;
            }
            count += 1;
        }
        Ok(count)
    }
}
