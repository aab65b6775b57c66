//! Store directory management.
//!
//! This module handles the file system layout for a GTFS store:
//!
//! ```text
//! <store_path>/
//! ├─ gtfs_lock         # Advisory lock for single-instance access
//! ├─ gtfs_log          # Write-ahead log
//! └─ <name>            # Data files, flat in the directory
//! ```
//!
//! The lock file ensures only one instance owns the directory at a time.
//! Neither `gtfs_lock` nor `gtfs_log` counts toward the data-file cap.

use crate::error::{GtfsError, GtfsResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Name of the write-ahead log inside the store directory.
pub const LOG_FILE_NAME: &str = "gtfs_log";

/// Name of the advisory lock sentinel inside the store directory.
pub const LOCK_FILE_NAME: &str = "gtfs_lock";

/// Manages the store directory structure and file locking.
///
/// A `StoreDir` holds an exclusive advisory lock on the directory's
/// sentinel file for its whole lifetime; the lock is released when the
/// `StoreDir` is dropped.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory, blocking until the exclusive
    /// lock can be acquired.
    ///
    /// A second process opening the same directory waits here until the
    /// first instance is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing and
    /// `create_if_missing` is false, the path is not a directory, or I/O
    /// fails.
    pub fn open(path: &Path, create_if_missing: bool) -> GtfsResult<Self> {
        Self::open_inner(path, create_if_missing, true)
    }

    /// Opens a store directory without waiting for the lock.
    ///
    /// # Errors
    ///
    /// Fails with [`GtfsError::StoreLocked`] when another instance holds
    /// the lock; otherwise as [`StoreDir::open`].
    pub fn try_open(path: &Path, create_if_missing: bool) -> GtfsResult<Self> {
        Self::open_inner(path, create_if_missing, false)
    }

    fn open_inner(path: &Path, create_if_missing: bool, block: bool) -> GtfsResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(GtfsError::invalid_directory(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(GtfsError::invalid_directory(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE_NAME);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if block {
            lock_file.lock_exclusive()?;
        } else if lock_file.try_lock_exclusive().is_err() {
            return Err(GtfsError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the write-ahead log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE_NAME)
    }

    /// Returns the path of a data file inside the store.
    #[must_use]
    pub fn data_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for StoreDir {
    fn drop(&mut self) {
        // The advisory lock is released when the file handle closes.
    }
}

/// Syncs a directory so entry creations and removals are durable.
///
/// On non-Unix platforms metadata journaling covers this and the call is
/// a no-op.
#[cfg(unix)]
pub(crate) fn sync_directory(path: &Path) -> GtfsResult<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_directory(_path: &Path) -> GtfsResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("new_store");

        assert!(!store_path.exists());

        let dir = StoreDir::open(&store_path, true).unwrap();
        assert!(store_path.exists());
        assert!(store_path.is_dir());

        drop(dir);
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("nonexistent");

        let result = StoreDir::open(&store_path, false);
        assert!(matches!(result, Err(GtfsError::InvalidDirectory { .. })));
    }

    #[test]
    fn lock_prevents_second_try_open() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("locked_store");

        let _dir1 = StoreDir::open(&store_path, true).unwrap();

        let result = StoreDir::try_open(&store_path, true);
        assert!(matches!(result, Err(GtfsError::StoreLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("reopen_store");

        {
            let _dir = StoreDir::open(&store_path, true).unwrap();
        }

        let _dir2 = StoreDir::try_open(&store_path, true).unwrap();
    }

    #[test]
    fn paths_are_correct() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("paths_store");

        let dir = StoreDir::open(&store_path, true).unwrap();

        assert_eq!(dir.log_path(), store_path.join("gtfs_log"));
        assert_eq!(dir.data_path("t1"), store_path.join("t1"));
    }
}
