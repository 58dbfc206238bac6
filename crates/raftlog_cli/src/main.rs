//! Raftlog CLI
//!
//! Command-line tools for examining raftlog segment directories.
//!
//! # Commands
//!
//! - `dump` - Print every segment header and entry
//! - `inspect` - Summarize segments, index ranges and sizes
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Raftlog segment directory tools.
#[derive(Parser)]
#[command(name = "raftlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Segment file name prefix
    #[arg(global = true, long, default_value = raftlog_core::DEFAULT_FILE_PREFIX)]
    prefix: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print segment headers and entries
    Dump {
        /// Skip entries below this index
        #[arg(long)]
        from: Option<i64>,

        /// Maximum number of entries to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Summarize the segments of a log directory
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Dump {
            from,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Log directory path required for dump")?;
            commands::dump::run(&path, &cli.prefix, from, limit, format)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Log directory path required for inspect")?;
            commands::inspect::run(&path, &cli.prefix, format)?;
        }
        Commands::Version => {
            println!("Raftlog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Raftlog Core v{}", raftlog_core::VERSION);
        }
    }

    Ok(())
}
