//! # GTFS Core
//!
//! Core engine for the GTFS transactional file store.
//!
//! GTFS offers crash-consistent, offset-addressed byte writes to flat
//! files within a single on-disk directory. Clients open logical files of
//! a fixed length, stage writes, and then either durably commit (`sync`)
//! or discard (`abort`) each staged write. After any crash, recovery
//! replays only the writes a client explicitly committed.
//!
//! This crate provides:
//! - The log codec and append-only write-ahead log
//! - The flat data-file store
//! - The transaction operations (write / sync / abort / remove)
//! - Crash recovery via log replay
//!
//! ## Example
//!
//! ```rust
//! use gtfs_core::Gtfs;
//! use tempfile::tempdir;
//!
//! let dir = tempdir().unwrap();
//! let mut fs = Gtfs::open(&dir.path().join("store")).unwrap();
//!
//! let file = fs.open_file("t1", 100).unwrap();
//! let write = fs.write(&file, 10, b"hello").unwrap();
//! fs.sync(&write).unwrap();
//!
//! assert_eq!(fs.read(&file, 10, 5).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod file;
mod gtfs;
mod log;
mod recovery;
mod store;
mod types;

pub use config::Config;
pub use dir::{StoreDir, LOCK_FILE_NAME, LOG_FILE_NAME};
pub use error::{GtfsError, GtfsResult};
pub use file::{FileHandle, WriteHandle};
pub use gtfs::Gtfs;
pub use log::{Action, LogIterator, LogManager, LogRecord};
pub use recovery::ReplayStats;
pub use store::FileStore;
pub use types::{WriteId, MAX_DATA_FILES_PER_DIR, MAX_FILENAME_LEN, MAX_FILE_LENGTH};

/// Crate version, surfaced by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
