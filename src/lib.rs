//! # Sparkify Lake
//!
//! Batch ETL for a music streaming data lake. Reads song metadata and user
//! activity logs (newline-delimited JSON, local or on S3), derives five
//! analytical tables and writes them back as partitioned Parquet.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sparkify_lake::{EtlConfig, Pipeline, Result};
//!
//! fn main() -> Result<()> {
//!     let config = EtlConfig::from_file("dl.yaml")?;
//!     let summary = Pipeline::new(config).run()?;
//!     for table in &summary.tables {
//!         println!("{} -> {} ({} rows)", table.table, table.path, table.rows);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Pipeline (one run)                       │
//! │   Session::for_config → songs/artists → users/time/songplays │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────┬────────────────┴─┬──────────────┬──────────────┐
//! │   Session   │     Tables       │  Timestamp   │   Output     │
//! ├─────────────┼──────────────────┼──────────────┼──────────────┤
//! │ DuckDB      │ songs, artists   │ epoch ms →   │ Location     │
//! │ read_json   │ users, time      │ local time   │ TableWriter  │
//! │ COPY TO     │ songplays        │ run stamp    │ object_store │
//! └─────────────┴──────────────────┴──────────────┴──────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Job configuration
pub mod config;

/// Epoch-millisecond normalization and run stamps
pub mod timestamp;

/// DuckDB query session
pub mod session;

/// Derived table definitions
pub mod tables;

/// Locations, storage access and Parquet output
pub mod output;

/// Job orchestration
pub mod pipeline;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::EtlConfig;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunSummary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
