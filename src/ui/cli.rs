//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// whouses: find and stop the processes using a file or folder
#[derive(Parser, Debug)]
#[command(name = "whouses")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine processing
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the processes using a file or folder
    Scan {
        /// File or folder to investigate
        path: PathBuf,

        /// Query file locks in batches instead of one file at a time
        #[arg(short, long)]
        batched: bool,

        /// Maximum number of files to check under a folder
        #[arg(short, long)]
        max_files: Option<usize>,
    },

    /// Forcefully terminate processes
    Kill {
        /// Process IDs to terminate
        #[arg(required = true)]
        pids: Vec<u32>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Scan this path again after terminating
        #[arg(long)]
        rescan: Option<PathBuf>,
    },

    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show application information
    Info,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the configuration file location
    Path,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
