//! Core type definitions for GTFS.

use std::fmt;

/// Maximum length of a data-file name, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Maximum number of data files in one store directory.
///
/// The log and lock files do not count toward the cap.
pub const MAX_DATA_FILES_PER_DIR: usize = 1024;

/// Maximum declared length of a data file, in bytes.
///
/// Offsets and lengths fit in 31 bits.
pub const MAX_FILE_LENGTH: u64 = i32::MAX as u64;

/// Unique identifier for a staged write.
///
/// Write-ids are minted from a per-instance counter and are strictly
/// increasing within one instance lifetime; they are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WriteId(pub u64);

impl WriteId {
    /// Creates a new write-id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w:{}", self.0)
    }
}
