//! Dump-log command implementation.

use gtfs_core::{GtfsError, LogManager, LOG_FILE_NAME};
use gtfs_storage::FileBackend;
use serde::Serialize;
use std::path::Path;

/// Log record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset of the record in the log file.
    pub offset: u64,
    /// Record action.
    pub action: String,
    /// Write-id the record names.
    pub write_id: u64,
    /// Target data file.
    pub file: String,
    /// Offset within the data file.
    pub file_offset: u64,
    /// Payload size in bytes.
    pub length: usize,
}

/// Runs the dump-log command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = path.join(LOG_FILE_NAME);
    if !log_path.exists() {
        return Err("log file not found".into());
    }

    let backend = FileBackend::open_read_only(&log_path)?;
    let log = LogManager::new(Box::new(backend), false);

    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    let mut malformed = None;

    for item in log.iter()? {
        if records.len() >= max_records {
            break;
        }
        match item {
            Ok((offset, record)) => records.push(RecordInfo {
                offset,
                action: record.action.to_string(),
                write_id: record.write_id.as_u64(),
                file: record.filename,
                file_offset: record.offset,
                length: record.payload.len(),
            }),
            Err(GtfsError::MalformedRecord { offset, message }) => {
                malformed = Some((offset, message));
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => print_text_output(&records),
    }

    if let Some((offset, message)) = malformed {
        eprintln!("malformed tail at offset {offset}: {message}");
    }

    Ok(())
}

fn print_text_output(records: &[RecordInfo]) {
    println!("Log records ({} total)", records.len());
    println!("================");
    println!();

    for record in records {
        println!(
            "[{:08}] {:6} id={} file={} offset={} len={}",
            record.offset,
            record.action,
            record.write_id,
            record.file,
            record.file_offset,
            record.length
        );
    }
}
