//! seglog CLI
//!
//! Command-line tools for inspecting segment files on disk.
//!
//! # Commands
//!
//! - `list` - List segments in a log directory
//! - `inspect` - Display segment offsets, sizes and fullness
//! - `dump` - Print records of a segment
//! - `verify` - Read back every record of a segment

mod commands;

use clap::{Parser, Subcommand};
use seglog_core::Config;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// seglog command-line segment tools.
#[derive(Parser)]
#[command(name = "seglog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Let recovery modify a damaged segment when opening it
    #[arg(global = true, long)]
    repair: bool,

    /// Store size ceiling used when opening segments
    #[arg(global = true, long)]
    max_store_bytes: Option<u64>,

    /// Index size ceiling used when opening segments
    #[arg(global = true, long)]
    max_index_bytes: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List segments in the log directory
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display segment offsets, sizes and fullness
    Inspect {
        /// Base offset of the segment
        #[arg(short, long)]
        base_offset: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print records of a segment
    Dump {
        /// Base offset of the segment
        #[arg(short, long)]
        base_offset: u64,

        /// Start from this offset (defaults to the base offset)
        #[arg(short, long)]
        offset: Option<u64>,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Read back every record of a segment
    Verify {
        /// Base offset of the segment
        #[arg(short, long)]
        base_offset: u64,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::default();
    if let Some(bytes) = cli.max_store_bytes {
        config = config.max_store_bytes(bytes);
    }
    if let Some(bytes) = cli.max_index_bytes {
        config = config.max_index_bytes(bytes);
    }
    debug!(?config, dir = ?cli.dir, "resolved segment config");

    match cli.command {
        Commands::List { format } => {
            let dir = cli.dir.ok_or("Log directory required for list")?;
            commands::list::run(&dir, &format)?;
        }
        Commands::Inspect {
            base_offset,
            format,
        } => {
            let dir = cli.dir.ok_or("Log directory required for inspect")?;
            commands::inspect::run(&dir, base_offset, config, cli.repair, &format)?;
        }
        Commands::Dump {
            base_offset,
            offset,
            limit,
            format,
        } => {
            let dir = cli.dir.ok_or("Log directory required for dump")?;
            commands::dump::run(
                &dir,
                base_offset,
                config,
                cli.repair,
                offset,
                limit,
                &format,
            )?;
        }
        Commands::Verify { base_offset } => {
            let dir = cli.dir.ok_or("Log directory required for verify")?;
            commands::verify::run(&dir, base_offset, config, cli.repair)?;
        }
        Commands::Version => {
            println!("seglog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("seglog core v{}", seglog_core::VERSION);
        }
    }

    Ok(())
}
