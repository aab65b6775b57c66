//! Crash recovery: log replay.
//!
//! On open, the instance replays the durable prefix of the log before
//! serving any client call. Replay runs with the instance in recovery
//! mode, so the effect routines it drives do not append records of their
//! own.
//!
//! Replay is idempotent: data-file writes are positional, removals
//! tolerate missing files, and a successful replay ends by truncating
//! the log - running it again is a no-op. A crash during replay leaves
//! the log intact, and the next open reproduces the same effects.

use crate::error::{GtfsError, GtfsResult};
use crate::file::WriteHandle;
use crate::gtfs::Gtfs;
use crate::log::{Action, LogRecord};
use tracing::debug;

/// What one replay pass applied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records read from the log before its end (or torn tail).
    pub records: usize,
    /// W records staged into memory.
    pub staged: usize,
    /// S records applied to data files.
    pub synced: usize,
    /// A records honored.
    pub aborted: usize,
    /// R records applied.
    pub removed: usize,
    /// Records skipped (missing data file or unmatched write-id).
    pub skipped: usize,
}

/// Replays the log against the data files.
///
/// Reads every decodable record, stops cleanly at end-of-log or at the
/// first malformed record (only the tail can be torn, because records
/// are appended whole and flushed), applies the effects in order, then
/// truncates the log and clears all in-memory state.
pub(crate) fn replay(gtfs: &mut Gtfs) -> GtfsResult<ReplayStats> {
    let mut stats = ReplayStats::default();

    if gtfs.log.size()? == 0 {
        return Ok(stats);
    }

    // Collect first: the iterator holds the log backend locked, and the
    // apply step needs the instance.
    let mut records: Vec<LogRecord> = Vec::new();
    for item in gtfs.log.iter()? {
        match item {
            Ok((_, record)) => records.push(record),
            Err(GtfsError::MalformedRecord { offset, message }) => {
                debug!(offset, %message, "malformed log tail; discarding remainder");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    stats.records = records.len();

    for record in records {
        apply(gtfs, record, &mut stats)?;
    }

    // Discard whatever is still pending and empty the log; committed
    // effects are already in the data files.
    gtfs.reset_state()?;
    gtfs.open_files.clear();

    Ok(stats)
}

/// Applies one replayed record.
fn apply(gtfs: &mut Gtfs, record: LogRecord, stats: &mut ReplayStats) -> GtfsResult<()> {
    // A record for a file that is gone (a later R removed it) is moot.
    if !gtfs.store.exists(&record.filename) {
        stats.skipped += 1;
        return Ok(());
    }

    match record.action {
        Action::Write => {
            let declared_len = gtfs.store.file_len(&record.filename)?;
            gtfs.stage_recovered_write(
                &record.filename,
                record.write_id,
                record.offset,
                record.payload,
                declared_len,
            )?;
            stats.staged += 1;
        }
        Action::Sync => {
            let handle = WriteHandle::new(&record.filename, record.write_id);
            let n = record.payload.len() as u64;
            match gtfs.sync_n_bytes(&handle, n) {
                Ok(_) => stats.synced += 1,
                Err(GtfsError::WriteNotPending { .. } | GtfsError::NotOpen { .. }) => {
                    stats.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Action::Abort => {
            let handle = WriteHandle::new(&record.filename, record.write_id);
            match gtfs.abort(&handle) {
                Ok(()) => stats.aborted += 1,
                Err(GtfsError::WriteNotPending { .. } | GtfsError::NotOpen { .. }) => {
                    stats.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Action::Remove => {
            gtfs.apply_remove(&record.filename)?;
            stats.removed += 1;
        }
    }

    Ok(())
}
