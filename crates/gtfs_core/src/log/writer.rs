//! Append-only log file.

use crate::error::{GtfsError, GtfsResult};
use crate::log::record::LogRecord;
use gtfs_storage::StorageBackend;
use parking_lot::Mutex;
use std::sync::Arc;

/// Manages the append-only write-ahead log.
///
/// `LogManager` owns the log's storage backend and provides appends,
/// explicit flushes, streaming iteration for recovery, and tail
/// truncation.
///
/// Appending and flushing are separate steps: every durable operation
/// appends its record and then calls [`LogManager::flush`] before
/// applying any effect, so the record reaches the operating system before
/// the operation can observably succeed.
pub struct LogManager {
    /// Storage backend holding the encoded records.
    backend: Arc<Mutex<Box<dyn StorageBackend>>>,
    /// Whether `flush` also fsyncs the backend.
    durable: bool,
}

impl LogManager {
    /// Creates a new log manager over the given backend.
    pub fn new(backend: Box<dyn StorageBackend>, durable: bool) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            durable,
        }
    }

    /// Appends a record to the log.
    ///
    /// Returns the offset where the record was written. Does NOT flush;
    /// call [`LogManager::flush`] once the operation's records are in.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying append fails.
    pub fn append(&self, record: &LogRecord) -> GtfsResult<u64> {
        let data = record.encode();
        let mut backend = self.backend.lock();
        let offset = backend.append(&data)?;
        Ok(offset)
    }

    /// Pushes appended records to the operating system.
    ///
    /// When the manager was created durable, this also fsyncs so the
    /// records survive power loss, not just a process crash.
    pub fn flush(&self) -> GtfsResult<()> {
        let mut backend = self.backend.lock();
        backend.flush()?;
        if self.durable {
            backend.sync()?;
        }
        Ok(())
    }

    /// Returns the current log size in bytes.
    pub fn size(&self) -> GtfsResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Returns a streaming iterator over log records.
    ///
    /// Reads records one-by-one with O(1) memory. The backend stays
    /// locked for the iterator's lifetime; drop it before appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn iter(&self) -> GtfsResult<super::LogIterator<'_>> {
        let backend = self.backend.lock();
        super::LogIterator::new(backend)
    }

    /// Removes the last `n` bytes of the log.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` when `n` exceeds the current log size.
    pub fn truncate_tail(&self, n: u64) -> GtfsResult<()> {
        let mut backend = self.backend.lock();
        let size = backend.size()?;
        let new_size = size.checked_sub(n).ok_or_else(|| {
            GtfsError::invalid_argument(format!(
                "cannot truncate {n} bytes from a {size}-byte log"
            ))
        })?;
        backend.truncate(new_size)?;
        Ok(())
    }

    /// Truncates the log to zero bytes.
    pub fn clear(&self) -> GtfsResult<()> {
        let mut backend = self.backend.lock();
        backend.truncate(0)?;
        Ok(())
    }

    /// Returns the backend for testing purposes.
    ///
    /// Lets tests manipulate raw log bytes to simulate torn appends.
    #[cfg(test)]
    pub(crate) fn backend_for_testing(&self) -> Arc<Mutex<Box<dyn StorageBackend>>> {
        Arc::clone(&self.backend)
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("durable", &self.durable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WriteId;
    use gtfs_storage::InMemoryBackend;

    fn create_log() -> LogManager {
        LogManager::new(Box::new(InMemoryBackend::new()), false)
    }

    fn read_all(log: &LogManager) -> Vec<(u64, LogRecord)> {
        log.iter().unwrap().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn append_and_read_back() {
        let log = create_log();
        let record = LogRecord::write(WriteId::new(1), "t1", 0, b"hello");
        log.append(&record).unwrap();
        log.flush().unwrap();

        let records = read_all(&log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, record);
    }

    #[test]
    fn append_returns_increasing_offsets() {
        let log = create_log();
        let r1 = LogRecord::write(WriteId::new(1), "a", 0, b"x");
        let r2 = LogRecord::sync(WriteId::new(1), "a", 0, b"x");

        let o1 = log.append(&r1).unwrap();
        let o2 = log.append(&r2).unwrap();

        assert_eq!(o1, 0);
        assert_eq!(o2, r1.encoded_len() as u64);
    }

    #[test]
    fn size_tracks_appends() {
        let log = create_log();
        assert_eq!(log.size().unwrap(), 0);

        let record = LogRecord::remove(WriteId::new(1), "gone");
        log.append(&record).unwrap();

        assert_eq!(log.size().unwrap(), record.encoded_len() as u64);
    }

    #[test]
    fn truncate_tail_drops_last_record() {
        let log = create_log();
        let r1 = LogRecord::write(WriteId::new(1), "a", 0, b"first");
        let r2 = LogRecord::write(WriteId::new(2), "a", 5, b"second");
        log.append(&r1).unwrap();
        log.append(&r2).unwrap();

        log.truncate_tail(r2.encoded_len() as u64).unwrap();

        let records = read_all(&log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, r1);
    }

    #[test]
    fn truncate_tail_beyond_size_is_invalid() {
        let log = create_log();
        log.append(&LogRecord::remove(WriteId::new(1), "x")).unwrap();

        let result = log.truncate_tail(log.size().unwrap() + 1);
        assert!(matches!(result, Err(GtfsError::InvalidArgument { .. })));
    }

    #[test]
    fn clear_empties_the_log() {
        let log = create_log();
        log.append(&LogRecord::write(WriteId::new(1), "a", 0, b"data"))
            .unwrap();
        assert!(log.size().unwrap() > 0);

        log.clear().unwrap();

        assert_eq!(log.size().unwrap(), 0);
        assert!(read_all(&log).is_empty());
    }
}
