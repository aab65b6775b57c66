//! Verify command implementation.
//!
//! Walks the log and checks its referential invariants: every S and A
//! record must name an earlier W record with the same write-id and
//! filename, and freshly minted write-ids (W and R records) must be
//! strictly increasing.

use gtfs_core::{Action, GtfsError, LogManager, LOG_FILE_NAME};
use gtfs_storage::FileBackend;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Runs the verify command.
///
/// Returns an error when any invariant is violated.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = path.join(LOG_FILE_NAME);
    if !log_path.exists() {
        info!("no log file; nothing to verify");
        return Ok(());
    }

    let backend = FileBackend::open_read_only(&log_path)?;
    let log = LogManager::new(Box::new(backend), false);

    // write-id of each W record -> target filename
    let mut staged: HashMap<u64, String> = HashMap::new();
    let mut last_minted_id = 0u64;
    let mut records = 0usize;
    let mut violations = Vec::new();

    for item in log.iter()? {
        let (offset, record) = match item {
            Ok(v) => v,
            Err(GtfsError::MalformedRecord { offset, message }) => {
                println!("malformed tail at offset {offset}: {message}");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        records += 1;
        let id = record.write_id.as_u64();

        match record.action {
            Action::Write | Action::Remove => {
                if id <= last_minted_id {
                    violations.push(format!(
                        "[{offset}] {} id {id} is not above the last minted id {last_minted_id}",
                        record.action
                    ));
                }
                last_minted_id = last_minted_id.max(id);

                if record.action == Action::Write {
                    staged.insert(id, record.filename.clone());
                }
            }
            Action::Sync | Action::Abort => match staged.get(&id) {
                Some(file) if *file == record.filename => {}
                Some(file) => violations.push(format!(
                    "[{offset}] {} id {id} names file {:?} but its W record named {file:?}",
                    record.action, record.filename
                )),
                None => violations.push(format!(
                    "[{offset}] {} id {id} has no earlier W record",
                    record.action
                )),
            },
        }
    }

    println!("checked {records} record(s)");
    if violations.is_empty() {
        println!("log invariants hold");
        Ok(())
    } else {
        for violation in &violations {
            println!("violation: {violation}");
        }
        Err(format!("{} invariant violation(s)", violations.len()).into())
    }
}
