//! Error types for GTFS core.

use std::io;
use thiserror::Error;

/// Result type for GTFS operations.
pub type GtfsResult<T> = Result<T, GtfsError>;

/// Errors that can occur in GTFS operations.
#[derive(Debug, Error)]
pub enum GtfsError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] gtfs_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument issue.
        message: String,
    },

    /// A read or staged write falls outside the file's declared length.
    #[error("range out of bounds: offset {offset} + len {len} exceeds file length {file_len}")]
    OutOfBounds {
        /// The requested offset.
        offset: u64,
        /// The requested length.
        len: u64,
        /// The file's declared length.
        file_len: u64,
    },

    /// Close attempted while staged writes are outstanding.
    #[error("file {filename:?} has {count} pending write(s)")]
    PendingWrites {
        /// Name of the file.
        filename: String,
        /// Number of outstanding pending writes.
        count: usize,
    },

    /// The named data file does not exist.
    #[error("file not found: {filename:?}")]
    NotFound {
        /// Name of the missing file.
        filename: String,
    },

    /// The file is already present in the open-files table.
    #[error("file already open: {filename:?}")]
    AlreadyOpen {
        /// Name of the file.
        filename: String,
    },

    /// The operation requires the file to be open, but it is not.
    #[error("file not open: {filename:?}")]
    NotOpen {
        /// Name of the file.
        filename: String,
    },

    /// The write handle no longer refers to a staged write.
    ///
    /// A write leaves the pending set exactly once, through `sync` or
    /// `abort`; any later use of its handle fails with this error.
    #[error("write {write_id} is not pending")]
    WriteNotPending {
        /// The write-id of the stale handle.
        write_id: u64,
    },

    /// The per-directory data-file cap was reached.
    #[error("directory holds the maximum of {limit} data files")]
    CapacityExceeded {
        /// The configured cap.
        limit: usize,
    },

    /// A file was opened with a declared length smaller than its on-disk size.
    #[error(
        "cannot shrink {filename:?}: on-disk size {existing} exceeds requested length {requested}"
    )]
    ShrinkNotAllowed {
        /// Name of the file.
        filename: String,
        /// Current on-disk size.
        existing: u64,
        /// Requested declared length.
        requested: u64,
    },

    /// Another process holds the store's exclusive lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The store directory path is unusable.
    #[error("invalid store directory: {message}")]
    InvalidDirectory {
        /// Description of the problem.
        message: String,
    },

    /// A log record could not be decoded.
    #[error("malformed log record at offset {offset}: {message}")]
    MalformedRecord {
        /// Byte offset of the record in the log.
        offset: u64,
        /// Description of the framing problem.
        message: String,
    },
}

impl GtfsError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid directory error.
    pub fn invalid_directory(message: impl Into<String>) -> Self {
        Self::InvalidDirectory {
            message: message.into(),
        }
    }

    /// Creates a malformed record error.
    pub fn malformed_record(offset: u64, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            offset,
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(filename: impl Into<String>) -> Self {
        Self::NotFound {
            filename: filename.into(),
        }
    }
}
