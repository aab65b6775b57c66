//! Test fixtures and store helpers.
//!
//! Provides convenience wrappers for setting up temporary stores and
//! simulating crash-and-reopen cycles.

use gtfs_core::{Config, Gtfs};
use gtfs_storage::StorageBackend;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary on-disk store with crash-and-reopen support.
///
/// The backing directory lives until the fixture is dropped, so a test
/// can "crash" (drop the instance without `clean`) and reopen to drive
/// recovery.
pub struct TestStore {
    /// Kept alive so the directory outlives instance restarts.
    _temp_dir: TempDir,
    path: PathBuf,
    fs: Option<Gtfs>,
}

impl TestStore {
    /// Creates a fresh store in a temporary directory.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a fresh store with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("store");
        let fs = Gtfs::open_with_config(&path, config).expect("failed to open store");
        Self {
            _temp_dir: temp_dir,
            path,
            fs: Some(fs),
        }
    }

    /// Returns the store instance.
    ///
    /// # Panics
    ///
    /// Panics if the store is currently "crashed"; call
    /// [`TestStore::reopen`] first.
    pub fn gtfs(&mut self) -> &mut Gtfs {
        self.fs.as_mut().expect("store is crashed; reopen it first")
    }

    /// Drops the instance without `clean`, leaving the log populated.
    ///
    /// This is the crash path: the next [`TestStore::reopen`] replays
    /// the log.
    pub fn crash(&mut self) {
        self.fs = None;
    }

    /// Shuts the instance down gracefully via `clean`.
    pub fn shutdown(&mut self) {
        if let Some(fs) = self.fs.take() {
            fs.clean().expect("clean failed");
        }
    }

    /// Opens a new instance on the same directory, running recovery.
    pub fn reopen(&mut self) {
        self.fs = None;
        self.fs = Some(Gtfs::open(&self.path).expect("failed to reopen store"));
    }

    /// Reopens with a caller-supplied log backend, for fault injection.
    pub fn reopen_with_log_backend(&mut self, backend: Box<dyn StorageBackend>) {
        self.fs = None;
        self.fs = Some(
            Gtfs::open_with_log_backend(&self.path, Config::default(), backend)
                .expect("failed to reopen store"),
        );
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the raw bytes of the on-disk log file.
    #[must_use]
    pub fn log_bytes(&self) -> Vec<u8> {
        std::fs::read(self.path.join(gtfs_core::LOG_FILE_NAME)).unwrap_or_default()
    }

    /// Returns the raw bytes of a data file.
    #[must_use]
    pub fn data_bytes(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.path.join(name)).expect("data file missing")
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test body against a fresh temporary store.
pub fn with_temp_store<F>(f: F)
where
    F: FnOnce(&mut Gtfs),
{
    let mut store = TestStore::new();
    f(store.gtfs());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_opens_and_reopens() {
        let mut store = TestStore::new();
        let file = store.gtfs().open_file("t1", 10).unwrap();
        let write = store.gtfs().write(&file, 0, b"abc").unwrap();
        store.gtfs().sync(&write).unwrap();

        store.crash();
        store.reopen();

        let file = store.gtfs().open_file("t1", 10).unwrap();
        assert_eq!(store.gtfs().read(&file, 0, 3).unwrap(), b"abc");
    }

    #[test]
    fn with_temp_store_runs_body() {
        with_temp_store(|fs| {
            let file = fs.open_file("t1", 5).unwrap();
            assert_eq!(fs.read(&file, 0, 5).unwrap(), vec![0u8; 5]);
        });
    }
}
