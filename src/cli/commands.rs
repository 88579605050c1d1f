//! CLI commands and argument parsing

use crate::config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sparkify data lake ETL
#[derive(Parser, Debug)]
#[command(name = "sparkify-lake")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the ETL job
    Run {
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate config and check that inputs and output are reachable
    Check,

    /// Show inferred input schemas without writing anything
    Discover {
        /// Print this many NextSong events as JSON
        #[arg(long, default_value = "0")]
        sample: usize,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run { json: false }
    }
}
