//! Store instance and transaction operations.
//!
//! [`Gtfs`] is the entry point: it owns the directory lock, the
//! write-ahead log, the file store, and the open-files table. Every
//! state-changing operation follows the same shape - build the log
//! record, append it, flush, then apply the effect - so that a crash at
//! any point is repaired by replay on the next open.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{GtfsError, GtfsResult};
use crate::file::{FileHandle, OpenFile, PendingWrite, WriteHandle};
use crate::log::{LogManager, LogRecord};
use crate::recovery::{self, ReplayStats};
use crate::store::FileStore;
use crate::types::{WriteId, MAX_DATA_FILES_PER_DIR, MAX_FILENAME_LEN, MAX_FILE_LENGTH};
use gtfs_storage::{FileBackend, StorageBackend};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Operating mode of an instance.
///
/// During recovery the effect routines run exactly as in normal mode but
/// suppress their own log appends, so replayed operations are not logged
/// a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Normal,
    Recovery,
}

/// One mounted store directory.
///
/// A `Gtfs` instance is single-threaded: operations take `&mut self` and
/// run to completion. Exclusive ownership of the directory across
/// processes is enforced by an advisory lock held for the instance's
/// lifetime; a second `open` of the same directory blocks until the
/// first instance is dropped.
///
/// Dropping an instance without calling [`Gtfs::clean`] leaves the log
/// populated; the next `open` replays it. That is the crash path, and
/// also the normal path for any process that does not shut down
/// gracefully.
///
/// # Example
///
/// ```rust,ignore
/// let mut fs = Gtfs::open(Path::new("my_store"))?;
/// let file = fs.open_file("t1", 100)?;
/// let write = fs.write(&file, 10, b"hello")?;
/// fs.sync(&write)?;
/// assert_eq!(fs.read(&file, 10, 5)?, b"hello");
/// ```
pub struct Gtfs {
    config: Config,
    /// Holds the directory lock for the instance lifetime.
    dir: StoreDir,
    pub(crate) store: FileStore,
    pub(crate) log: LogManager,
    pub(crate) open_files: HashMap<String, OpenFile>,
    pub(crate) next_write_id: u64,
    pub(crate) mode: Mode,
    replayed: ReplayStats,
}

impl Gtfs {
    /// Opens a store with default configuration.
    ///
    /// Creates the directory if missing, acquires the exclusive lock
    /// (blocking), replays the log, and truncates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is unusable or I/O fails during
    /// recovery.
    pub fn open(path: &Path) -> GtfsResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a store with the given configuration.
    pub fn open_with_config(path: &Path, config: Config) -> GtfsResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.log_path())?;
        Self::bootstrap(dir, config, Box::new(backend))
    }

    /// Opens a store with a caller-supplied log backend.
    ///
    /// This is the seam fault-injection tests use to tear the log or fail
    /// flushes; production callers want [`Gtfs::open`].
    pub fn open_with_log_backend(
        path: &Path,
        config: Config,
        backend: Box<dyn StorageBackend>,
    ) -> GtfsResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        Self::bootstrap(dir, config, backend)
    }

    fn bootstrap(
        dir: StoreDir,
        config: Config,
        backend: Box<dyn StorageBackend>,
    ) -> GtfsResult<Self> {
        let store = FileStore::new(dir.path().to_path_buf());
        let log = LogManager::new(backend, config.sync_on_write);

        let mut gtfs = Self {
            config,
            dir,
            store,
            log,
            open_files: HashMap::new(),
            next_write_id: 1,
            mode: Mode::Recovery,
            replayed: ReplayStats::default(),
        };

        let stats = recovery::replay(&mut gtfs)?;
        debug!(
            records = stats.records,
            staged = stats.staged,
            synced = stats.synced,
            aborted = stats.aborted,
            removed = stats.removed,
            skipped = stats.skipped,
            "log replay complete"
        );
        gtfs.replayed = stats;
        gtfs.mode = Mode::Normal;

        Ok(gtfs)
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns what the opening replay applied.
    #[must_use]
    pub fn replay_stats(&self) -> ReplayStats {
        self.replayed
    }

    /// Returns the current log size in bytes.
    pub fn log_size(&self) -> GtfsResult<u64> {
        self.log.size()
    }

    /// Returns the number of staged writes on an open file.
    pub fn pending_writes(&self, file: &FileHandle) -> GtfsResult<usize> {
        let of = self.resolve(file.name())?;
        Ok(of.pending.len())
    }

    /// Opens a data file with the given declared length.
    ///
    /// Creates the file zero-filled if it does not exist; extends it
    /// zero-filled if it exists with a smaller size.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` - bad name or a length above 2^31 - 1
    /// - `AlreadyOpen` - the name is already in the open-files table
    /// - `CapacityExceeded` - the directory is at its data-file cap and
    ///   the named file does not exist yet
    /// - `ShrinkNotAllowed` - the on-disk file is larger than `length`
    pub fn open_file(&mut self, name: &str, length: u64) -> GtfsResult<FileHandle> {
        validate_filename(name)?;
        if length > MAX_FILE_LENGTH {
            return Err(GtfsError::invalid_argument(format!(
                "declared length {length} exceeds maximum {MAX_FILE_LENGTH}"
            )));
        }

        if self.open_files.contains_key(name) {
            return Err(GtfsError::AlreadyOpen {
                filename: name.to_string(),
            });
        }

        // The cap gates creation only; reopening an existing file always
        // succeeds.
        if !self.store.exists(name) && self.store.count_data_files()? >= MAX_DATA_FILES_PER_DIR {
            return Err(GtfsError::CapacityExceeded {
                limit: MAX_DATA_FILES_PER_DIR,
            });
        }

        self.store.create_or_extend(name, length)?;
        self.open_files
            .insert(name.to_string(), OpenFile::new(name, length));

        if self.config.verbose {
            debug!(name, length, "opened file");
        }
        Ok(FileHandle::new(name, length))
    }

    /// Closes an open file.
    ///
    /// # Errors
    ///
    /// Fails with `PendingWrites` while staged writes are outstanding;
    /// each must be synced or aborted first.
    pub fn close_file(&mut self, file: &FileHandle) -> GtfsResult<()> {
        let of = self.resolve(file.name())?;
        if !of.pending.is_empty() {
            return Err(GtfsError::PendingWrites {
                filename: of.name.clone(),
                count: of.pending.len(),
            });
        }
        self.open_files.remove(file.name());
        Ok(())
    }

    /// Removes a closed file's on-disk data.
    ///
    /// Appends an R record before deleting, so a crash between the two
    /// is repaired by replay (the delete is retried idempotently).
    ///
    /// # Errors
    ///
    /// - `AlreadyOpen` - the file is still in the open-files table
    /// - `NotFound` - no such data file on disk
    /// - `Io` - the deletion itself failed; the R record stands
    pub fn remove_file(&mut self, file: &FileHandle) -> GtfsResult<()> {
        let name = file.name();
        if self.open_files.contains_key(name) {
            return Err(GtfsError::AlreadyOpen {
                filename: name.to_string(),
            });
        }
        if !self.store.exists(name) {
            return Err(GtfsError::not_found(name));
        }
        self.apply_remove(name)
    }

    /// Reads `length` bytes at `offset`, merging staged writes over the
    /// persisted bytes.
    ///
    /// Staged writes overlay in insertion order, so later writes win on
    /// overlap. Never touches the log.
    pub fn read(&self, file: &FileHandle, offset: u64, length: u64) -> GtfsResult<Vec<u8>> {
        let of = self.resolve(file.name())?;
        check_bounds(offset, length, of.declared_len)?;

        let mut buf = self.store.read_range(&of.name, 0, of.declared_len)?;
        of.overlay(&mut buf);

        Ok(buf[offset as usize..(offset + length) as usize].to_vec())
    }

    /// Stages a write of `data` at `offset`.
    ///
    /// The write is logged and kept in memory; it reaches the data file
    /// only through [`Gtfs::sync`]. Returns a handle naming the staged
    /// write.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` - empty `data`
    /// - `OutOfBounds` - the range exceeds the declared length
    pub fn write(&mut self, file: &FileHandle, offset: u64, data: &[u8]) -> GtfsResult<WriteHandle> {
        if data.is_empty() {
            return Err(GtfsError::invalid_argument("cannot stage an empty write"));
        }

        let of = self
            .open_files
            .get_mut(file.name())
            .ok_or_else(|| GtfsError::NotOpen {
                filename: file.name().to_string(),
            })?;
        check_bounds(offset, data.len() as u64, of.declared_len)?;

        let id = WriteId::new(self.next_write_id);
        self.log
            .append(&LogRecord::write(id, &of.name, offset, data))?;
        self.log.flush()?;
        self.next_write_id += 1;

        of.pending.push(PendingWrite {
            id,
            offset,
            data: data.to_vec(),
        });

        if self.config.verbose {
            debug!(file = %of.name, %id, offset, len = data.len(), "staged write");
        }
        Ok(WriteHandle::new(&of.name, id))
    }

    /// Commits a staged write to its data file.
    ///
    /// Appends an S record, flushes, writes the staged bytes at their
    /// offset, and discards the staged write. Returns the number of
    /// bytes written.
    ///
    /// If the data-file write fails, the S record already stands and the
    /// write stays pending; the next open's replay completes the commit.
    pub fn sync(&mut self, write: &WriteHandle) -> GtfsResult<u64> {
        self.sync_pending(write, None)
    }

    /// Commits the first `n` bytes of a staged write.
    ///
    /// The staged write remains pending unless `n` covers its full
    /// length, so later full or partial syncs stay legal.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` when `n` exceeds the staged length.
    pub fn sync_n_bytes(&mut self, write: &WriteHandle, n: u64) -> GtfsResult<u64> {
        self.sync_pending(write, Some(n))
    }

    /// Discards a staged write.
    ///
    /// Appends an A record and removes the write from its file's pending
    /// sequence. Only the targeted write is discarded; other staged
    /// writes on the same file keep their order.
    pub fn abort(&mut self, write: &WriteHandle) -> GtfsResult<()> {
        let of = self
            .open_files
            .get_mut(write.file())
            .ok_or_else(|| GtfsError::NotOpen {
                filename: write.file().to_string(),
            })?;
        let idx = of
            .position_of(write.id())
            .ok_or(GtfsError::WriteNotPending {
                write_id: write.id().as_u64(),
            })?;

        if self.mode == Mode::Normal {
            let pw = &of.pending[idx];
            self.log
                .append(&LogRecord::abort(pw.id, &of.name, pw.offset, &pw.data))?;
            self.log.flush()?;
        }

        of.pending.remove(idx);
        Ok(())
    }

    /// Discards all staged writes, truncates the log to zero bytes, and
    /// tears the instance down.
    ///
    /// Data files keep whatever was last committed by `sync`.
    pub fn clean(mut self) -> GtfsResult<()> {
        self.reset_state()
        // Dropping releases the directory lock.
    }

    /// Truncates exactly `n` bytes from the tail of the log, leaving
    /// instance state otherwise unchanged.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` when `n` exceeds the log size.
    pub fn clean_n_bytes(&mut self, n: u64) -> GtfsResult<()> {
        self.log.truncate_tail(n)
    }

    /// Shared body of `sync` and `sync_n_bytes`; `prefix` of `None`
    /// commits the full staged length.
    fn sync_pending(&mut self, write: &WriteHandle, prefix: Option<u64>) -> GtfsResult<u64> {
        let of = self
            .open_files
            .get_mut(write.file())
            .ok_or_else(|| GtfsError::NotOpen {
                filename: write.file().to_string(),
            })?;
        let idx = of
            .position_of(write.id())
            .ok_or(GtfsError::WriteNotPending {
                write_id: write.id().as_u64(),
            })?;

        let staged_len = of.pending[idx].len();
        let n = match prefix {
            None => staged_len,
            Some(n) if n <= staged_len => n,
            Some(n) => {
                return Err(GtfsError::invalid_argument(format!(
                    "cannot sync {n} bytes of a {staged_len}-byte write"
                )))
            }
        };

        // The commit record goes first; if the data write below fails,
        // replay finishes the job on the next open.
        if self.mode == Mode::Normal {
            let pw = &of.pending[idx];
            self.log.append(&LogRecord::sync(
                pw.id,
                &of.name,
                pw.offset,
                &pw.data[..n as usize],
            ))?;
            self.log.flush()?;
        }

        let pw = &of.pending[idx];
        self.store
            .write_range(&of.name, pw.offset, &pw.data[..n as usize])?;

        if n == staged_len {
            of.pending.remove(idx);
        }

        if self.config.verbose {
            debug!(file = write.file(), id = %write.id(), n, "synced write");
        }
        Ok(n)
    }

    /// Logs and performs a data-file removal.
    ///
    /// In recovery mode the R record is not re-logged and a missing file
    /// is tolerated.
    pub(crate) fn apply_remove(&mut self, name: &str) -> GtfsResult<()> {
        if self.mode == Mode::Normal {
            let id = WriteId::new(self.next_write_id);
            self.log.append(&LogRecord::remove(id, name))?;
            self.log.flush()?;
            self.next_write_id += 1;

            self.store.remove(name)
        } else {
            self.store.remove_if_exists(name)?;
            Ok(())
        }
    }

    /// Re-creates a staged write from a replayed W record.
    pub(crate) fn stage_recovered_write(
        &mut self,
        name: &str,
        id: WriteId,
        offset: u64,
        data: Vec<u8>,
        declared_len: u64,
    ) -> GtfsResult<()> {
        let of = self
            .open_files
            .entry(name.to_string())
            .or_insert_with(|| OpenFile::new(name, declared_len));
        of.pending.push(PendingWrite { id, offset, data });

        if id.as_u64() >= self.next_write_id {
            self.next_write_id = id.as_u64() + 1;
        }
        Ok(())
    }

    /// Drops all staged writes and truncates the log to zero.
    pub(crate) fn reset_state(&mut self) -> GtfsResult<()> {
        for of in self.open_files.values_mut() {
            of.pending.clear();
        }
        self.log.clear()
    }

    fn resolve(&self, name: &str) -> GtfsResult<&OpenFile> {
        self.open_files.get(name).ok_or_else(|| GtfsError::NotOpen {
            filename: name.to_string(),
        })
    }
}

impl std::fmt::Debug for Gtfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gtfs")
            .field("path", &self.dir.path())
            .field("open_files", &self.open_files.len())
            .field("next_write_id", &self.next_write_id)
            .finish_non_exhaustive()
    }
}

/// Validates a data-file name against the naming rules.
///
/// Names are 1..=255 bytes, contain no `/` (they must stay inside the
/// store directory) and no space (spaces collide with the record
/// framing), and may not shadow the log or lock files.
fn validate_filename(name: &str) -> GtfsResult<()> {
    if name.is_empty() {
        return Err(GtfsError::invalid_argument("filename is empty"));
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(GtfsError::invalid_argument(format!(
            "filename longer than {MAX_FILENAME_LEN} bytes"
        )));
    }
    if name == "." || name == ".." || name.contains('/') {
        return Err(GtfsError::invalid_argument(format!(
            "filename {name:?} is not a plain name"
        )));
    }
    if name.contains(' ') {
        return Err(GtfsError::invalid_argument(format!(
            "filename {name:?} contains a space"
        )));
    }
    if name == crate::dir::LOG_FILE_NAME || name == crate::dir::LOCK_FILE_NAME {
        return Err(GtfsError::invalid_argument(format!(
            "filename {name:?} is reserved"
        )));
    }
    Ok(())
}

/// Bounds-checks a range against a file's declared length.
fn check_bounds(offset: u64, len: u64, file_len: u64) -> GtfsResult<()> {
    let end = offset
        .checked_add(len)
        .ok_or(GtfsError::OutOfBounds {
            offset,
            len,
            file_len,
        })?;
    if end > file_len {
        return Err(GtfsError::OutOfBounds {
            offset,
            len,
            file_len,
        });
    }
    Ok(())
}
