//! Crash-injection storage backend.
//!
//! Wraps any [`StorageBackend`] and injects failures on command:
//!
//! 1. **Torn append** - after a byte budget is exhausted, an append
//!    writes only the bytes that fit and then fails, leaving a partial
//!    record on disk exactly as a crash mid-append would
//! 2. **Failed flush** - `flush`/`sync` return an error while the data
//!    already handed to the inner backend stays put
//!
//! Combined with `Gtfs::open_with_log_backend`, this drives the recovery
//! paths that a real crash would exercise.

use gtfs_storage::{StorageBackend, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct CrashState {
    /// Budget of appendable bytes; `usize::MAX` means unlimited.
    write_cap: AtomicUsize,
    /// Bytes appended so far.
    written: AtomicUsize,
    /// Whether flush and sync fail.
    fail_on_flush: AtomicBool,
}

/// Remote control for a [`CrashableBackend`].
///
/// The backend is moved into the store under test; the controller stays
/// with the test and flips failure modes at the right moment.
#[derive(Debug, Clone)]
pub struct CrashController {
    state: Arc<CrashState>,
}

impl CrashController {
    /// Allows `budget` more appended bytes; the append that crosses the
    /// budget is torn.
    pub fn crash_after(&self, budget: usize) {
        let written = self.state.written.load(Ordering::SeqCst);
        self.state
            .write_cap
            .store(written.saturating_add(budget), Ordering::SeqCst);
    }

    /// Sets whether `flush` and `sync` fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.state.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Clears all failure modes.
    pub fn reset(&self) {
        self.state.write_cap.store(usize::MAX, Ordering::SeqCst);
        self.state.fail_on_flush.store(false, Ordering::SeqCst);
    }

    /// Returns how many bytes have been appended through the wrapper.
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.state.written.load(Ordering::SeqCst)
    }
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    state: Arc<CrashState>,
}

impl CrashableBackend {
    /// Wraps `inner`, returning the backend and its controller.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, CrashController) {
        let state = Arc::new(CrashState {
            write_cap: AtomicUsize::new(usize::MAX),
            written: AtomicUsize::new(0),
            fail_on_flush: AtomicBool::new(false),
        });
        let controller = CrashController {
            state: Arc::clone(&state),
        };
        (Self { inner, state }, controller)
    }

    fn injected(what: &str) -> io::Error {
        io::Error::other(format!("injected failure: {what}"))
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.inner.write_at(offset, data)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let cap = self.state.write_cap.load(Ordering::SeqCst);
        let written = self.state.written.load(Ordering::SeqCst);
        let allowance = cap.saturating_sub(written);

        if allowance < data.len() {
            // Tear the append: keep the prefix that "made it to disk".
            self.inner.append(&data[..allowance])?;
            self.state
                .written
                .store(written + allowance, Ordering::SeqCst);
            return Err(Self::injected("append torn by crash").into());
        }

        let offset = self.inner.append(data)?;
        self.state
            .written
            .store(written + data.len(), Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.state.fail_on_flush.load(Ordering::SeqCst) {
            return Err(Self::injected("flush").into());
        }
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.state.fail_on_flush.load(Ordering::SeqCst) {
            return Err(Self::injected("sync").into());
        }
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }

    fn extend(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.extend(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_storage::InMemoryBackend;

    #[test]
    fn passes_through_when_idle() {
        let (mut backend, _ctrl) = CrashableBackend::new(Box::new(InMemoryBackend::new()));

        backend.append(b"hello").unwrap();
        backend.flush().unwrap();

        assert_eq!(backend.read_at(0, 5).unwrap(), b"hello");
        assert_eq!(backend.size().unwrap(), 5);
    }

    #[test]
    fn tears_the_append_past_the_budget() {
        let (mut backend, ctrl) = CrashableBackend::new(Box::new(InMemoryBackend::new()));

        backend.append(b"first").unwrap();
        ctrl.crash_after(3);

        let result = backend.append(b"second");
        assert!(result.is_err());

        // Only the prefix that fit the budget landed.
        assert_eq!(backend.size().unwrap(), 8);
        assert_eq!(backend.read_at(5, 3).unwrap(), b"sec");
    }

    #[test]
    fn fails_flush_on_command() {
        let (mut backend, ctrl) = CrashableBackend::new(Box::new(InMemoryBackend::new()));

        ctrl.set_fail_on_flush(true);
        assert!(backend.flush().is_err());
        assert!(backend.sync().is_err());

        ctrl.reset();
        assert!(backend.flush().is_ok());
    }

    #[test]
    fn tracks_bytes_written() {
        let (mut backend, ctrl) = CrashableBackend::new(Box::new(InMemoryBackend::new()));

        backend.append(b"12345").unwrap();
        assert_eq!(ctrl.bytes_written(), 5);
    }
}
