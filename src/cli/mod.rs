//! CLI module
//!
//! Command-line interface for the ETL job.
//!
//! # Commands
//!
//! - `run` - Execute the job (default when no command is given)
//! - `check` - Validate config and confirm every location is reachable
//! - `discover` - Show the inferred input schemas without writing anything

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
