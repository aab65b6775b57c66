//! Streaming log record iterator.
//!
//! Provides O(1) memory streaming over log records, reading them
//! one-by-one from the storage backend without loading the entire log
//! into memory.
//!
//! # Recovery Policy
//!
//! Records are appended whole and flushed before an operation returns, so
//! only the log's tail can be damaged by a crash. The iterator therefore
//! distinguishes:
//!
//! ## Tolerated (clean end-of-log, `next()` returns `None`)
//!
//! - Truncated header: the log ends before the header's last field
//! - Truncated payload: the declared length exceeds the remaining bytes
//!
//! ## Reported (yields one `Err(MalformedRecord)`, then ends)
//!
//! - A header that cannot be parsed (non-digit fields, missing
//!   separators, over-long fields)
//! - A frame whose terminator byte is wrong
//!
//! Recovery treats both the same way - replay stops and the remainder of
//! the log is discarded - but the error form carries the offset so
//! tooling can report where the damage starts.
//!
//! A frame whose header parses but whose action byte is unknown is
//! stepped over by its length field and skipped.

use crate::error::{GtfsError, GtfsResult};
use crate::log::record::{parse_header, HeaderParse, LogRecord, MAX_HEADER_LEN, TERMINATOR};
use gtfs_storage::StorageBackend;
use parking_lot::MutexGuard;
use tracing::warn;

/// Read buffer size for streaming iteration.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A streaming iterator over log records.
///
/// Yields `(offset, record)` pairs in log order. Memory use is constant
/// for typical records; the buffer grows only when a single record is
/// larger than the default buffer and shrinks never.
pub struct LogIterator<'a> {
    /// Locked storage backend holding the log bytes.
    backend: MutexGuard<'a, Box<dyn StorageBackend>>,
    /// Total size of the log.
    total_size: u64,
    /// Log offset of the next unconsumed record.
    current_offset: u64,
    /// Read buffer.
    buffer: Vec<u8>,
    /// Current position within the buffer.
    buffer_pos: usize,
    /// Number of valid bytes in the buffer.
    buffer_len: usize,
    /// Frames skipped because their action byte was unknown.
    skipped_unknown: usize,
    /// Whether iteration has ended.
    finished: bool,
}

impl<'a> LogIterator<'a> {
    /// Creates a new streaming iterator over the whole log.
    pub(crate) fn new(backend: MutexGuard<'a, Box<dyn StorageBackend>>) -> GtfsResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            current_offset: 0,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            buffer_pos: 0,
            buffer_len: 0,
            skipped_unknown: 0,
            finished: false,
        })
    }

    /// Returns how many unknown-action frames were stepped over so far.
    #[must_use]
    pub fn skipped_unknown(&self) -> usize {
        self.skipped_unknown
    }

    /// Ensures at least `min_bytes` are buffered from the current
    /// position, reading from the backend as needed.
    ///
    /// Returns `false` when the log ends before `min_bytes` are
    /// available; whatever remains is still buffered.
    fn ensure_buffered(&mut self, min_bytes: usize) -> GtfsResult<bool> {
        let available = self.buffer_len - self.buffer_pos;
        if available >= min_bytes {
            return Ok(true);
        }

        // Move the unconsumed tail to the start of the buffer.
        if self.buffer_pos > 0 && available > 0 {
            self.buffer.copy_within(self.buffer_pos..self.buffer_len, 0);
        }
        self.buffer_len = available;
        self.buffer_pos = 0;

        if min_bytes > self.buffer.len() {
            self.buffer.resize(min_bytes.next_power_of_two(), 0);
        }

        let read_offset = self.current_offset + self.buffer_len as u64;
        let remaining = (self.total_size - read_offset) as usize;
        let to_read = remaining.min(self.buffer.len() - self.buffer_len);

        if to_read > 0 {
            let data = self.backend.read_at(read_offset, to_read)?;
            self.buffer[self.buffer_len..self.buffer_len + data.len()].copy_from_slice(&data);
            self.buffer_len += data.len();
        }

        Ok(self.buffer_len - self.buffer_pos >= min_bytes)
    }

    /// Reads the next record, skipping unknown-action frames.
    ///
    /// Returns `Ok(Some((offset, record)))` for a valid record,
    /// `Ok(None)` at end-of-log or on a truncated tail, and
    /// `Err(MalformedRecord)` on an unparseable header or bad terminator.
    fn read_next_record(&mut self) -> GtfsResult<Option<(u64, LogRecord)>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let record_offset = self.current_offset;

            // Buffer up to a full header; a shorter fill means the log
            // ends within this header.
            self.ensure_buffered(MAX_HEADER_LEN)?;
            let available = self.buffer_len - self.buffer_pos;
            if available == 0 {
                self.finished = true;
                return Ok(None);
            }

            let header = match parse_header(&self.buffer[self.buffer_pos..self.buffer_len]) {
                HeaderParse::Complete(header) => header,
                HeaderParse::NeedMore => {
                    // Torn tail: the final append did not complete.
                    self.finished = true;
                    return Ok(None);
                }
                HeaderParse::Malformed(message) => {
                    self.finished = true;
                    return Err(GtfsError::malformed_record(record_offset, message));
                }
            };

            let total_len = header.frame_len();
            if !self.ensure_buffered(total_len)? {
                // Header landed but the payload did not.
                self.finished = true;
                return Ok(None);
            }

            let terminator = self.buffer[self.buffer_pos + total_len - 1];
            if terminator != TERMINATOR {
                self.finished = true;
                return Err(GtfsError::malformed_record(
                    record_offset,
                    format!("bad terminator byte 0x{terminator:02x}"),
                ));
            }

            let payload_start = self.buffer_pos + header.header_len;
            let payload = self.buffer[payload_start..payload_start + header.payload_len].to_vec();

            self.buffer_pos += total_len;
            self.current_offset += total_len as u64;

            match header.into_record(payload) {
                Some(record) => return Ok(Some((record_offset, record))),
                None => {
                    self.skipped_unknown += 1;
                    warn!(offset = record_offset, "skipping unknown log record action");
                }
            }
        }
    }
}

impl Iterator for LogIterator<'_> {
    type Item = GtfsResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
