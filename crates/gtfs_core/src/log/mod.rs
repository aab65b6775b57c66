//! Write-ahead log for durability and crash recovery.
//!
//! Every state-changing operation (write, sync, abort, remove) appends a
//! record here and flushes it before the effect is applied, so a crash at
//! any point can be repaired by replaying the log on the next open.
//!
//! ## Record Format
//!
//! ```text
//! <action:1> SP <write_id> SP <filename> SP <offset> SP <length> SP <payload:length bytes> LF
//! ```
//!
//! The header is ASCII; the payload is raw bytes located by the `length`
//! field. Decoding never scans the payload region for delimiters, so the
//! payload may contain any byte value.
//!
//! ## Invariants
//!
//! - The log is **append-only**; records are never rewritten in place
//! - Every record is **flushed before its operation returns**
//! - Only the **tail** can be torn, because records are appended whole
//! - Replay is **idempotent**: data-file writes are positional and
//!   removals tolerate missing files

mod iterator;
mod record;
mod writer;

pub use iterator::LogIterator;
pub use record::{Action, LogRecord};
pub use writer::LogManager;
