//! Output module
//!
//! Handles where tables go and how they are written.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Parsing input/output locations (S3 or local) and listing them
//! - Writing derived tables as (partitioned) Parquet
//! - Rendering table schemas for the run log

mod location;
mod schema;
mod writer;

pub use location::{Location, StorageClient};
pub use schema::{format_schema, type_name};
pub use writer::{
    Compression, ParquetOptions, TableWriteResult, TableWriter, SINGLE_FILE_NAME,
};
