//! # GTFS Testkit
//!
//! Test utilities for GTFS.
//!
//! This crate provides:
//! - Store fixtures with crash-and-reopen support
//! - A fault-injecting storage backend for torn appends and failed
//!   flushes
//! - A harness that tracks expected committed state across operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gtfs_testkit::TestStore;
//!
//! #[test]
//! fn survives_a_crash() {
//!     let mut store = TestStore::new();
//!     let file = store.gtfs().open_file("t1", 100).unwrap();
//!     // ... stage and sync writes ...
//!     store.crash();
//!     store.reopen();
//!     // ... verify recovered state ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod integration;

pub use crash::{CrashController, CrashableBackend};
pub use fixtures::{with_temp_store, TestStore};
pub use integration::StoreHarness;
