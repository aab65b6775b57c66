//! GTFS CLI
//!
//! Command-line tools for GTFS store management.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics (data files, log size)
//! - `verify` - Check log invariants and report a damaged tail
//! - `dump-log` - Dump log records for debugging
//!
//! All commands read the store without taking its lock, so they are safe
//! to run against a directory a live instance owns.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// GTFS command-line store tools.
#[derive(Parser)]
#[command(name = "gtfs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check log invariants
    Verify,

    /// Dump log records for debugging
    DumpLog {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("store path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::DumpLog { limit, format } => {
            let path = cli.path.ok_or("store path required for dump-log")?;
            commands::dump_log::run(&path, limit, &format)?;
        }
        Commands::Version => {
            println!("GTFS CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("GTFS Core v{}", gtfs_core::VERSION);
        }
    }

    Ok(())
}
