//! Inspect command implementation.

use gtfs_core::{LOCK_FILE_NAME, LOG_FILE_NAME};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// One data file's stats.
#[derive(Debug, Serialize)]
pub struct DataFileInfo {
    /// File name.
    pub name: String,
    /// On-disk size, which equals the declared length.
    pub bytes: u64,
}

/// Store-level stats.
#[derive(Debug, Serialize)]
pub struct StoreInfo {
    /// Store directory.
    pub path: String,
    /// Number of data files (log and lock excluded).
    pub data_file_count: usize,
    /// Total data bytes.
    pub data_bytes: u64,
    /// Current log size in bytes.
    pub log_bytes: u64,
    /// Per-file stats, sorted by name.
    pub data_files: Vec<DataFileInfo>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("not a store directory: {}", path.display()).into());
    }

    let mut data_files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == LOG_FILE_NAME || name == LOCK_FILE_NAME {
            continue;
        }
        data_files.push(DataFileInfo {
            bytes: entry.metadata()?.len(),
            name,
        });
    }
    data_files.sort_by(|a, b| a.name.cmp(&b.name));

    let log_bytes = fs::metadata(path.join(LOG_FILE_NAME))
        .map(|m| m.len())
        .unwrap_or(0);

    let info = StoreInfo {
        path: path.display().to_string(),
        data_file_count: data_files.len(),
        data_bytes: data_files.iter().map(|f| f.bytes).sum(),
        log_bytes,
        data_files,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&info)?),
        _ => print_text_output(&info),
    }

    Ok(())
}

fn print_text_output(info: &StoreInfo) {
    println!("Store: {}", info.path);
    println!("  data files: {}", info.data_file_count);
    println!("  data bytes: {}", info.data_bytes);
    println!("  log bytes:  {}", info.log_bytes);
    println!();

    for file in &info.data_files {
        println!("  {:10} {} bytes", file.name, file.bytes);
    }
}
