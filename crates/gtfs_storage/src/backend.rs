//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for GTFS.
///
/// Storage backends are **opaque byte stores**. They provide simple
/// operations for reading, writing, appending, and flushing data. GTFS owns
/// all format interpretation - backends do not understand log records or
/// data-file layouts.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `write_at` never changes the storage size
/// - `flush` pushes buffered bytes to the operating system
/// - Backends must be `Send + Sync` so one log store can be shared
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the current size
    /// or an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes `data` at `offset`, overwriting existing bytes in place.
    ///
    /// The written range must lie entirely within the current size; this
    /// operation never grows the storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the write would extend beyond the current size
    /// or an I/O error occurs.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all pending writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - after it returns, the
    /// data survives power loss, not just process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Truncates the storage to the given size.
    ///
    /// Removes all data after `new_size`. Used to drop the tail of the
    /// write-ahead log.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Grows the storage to `new_size`, zero-filling the added bytes.
    ///
    /// A `new_size` at or below the current size is a no-op; `extend`
    /// never shrinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the growth fails.
    fn extend(&mut self, new_size: u64) -> StorageResult<()>;
}
