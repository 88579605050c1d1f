//! Parquet table writer
//!
//! Each derived table lands in its own directory,
//! `{output_root}{name}_table.{run_stamp}`. Partitioned tables use Hive-style
//! `column=value/` subdirectories; unpartitioned tables are a single
//! `part-00000.parquet` file inside the directory. Existing outputs are never
//! touched because every write gets a fresh stamp.

use super::Location;
use crate::error::{Error, Result, ResultExt};
use crate::session::{quote_ident, Session};
use crate::tables::DerivedTable;
use crate::timestamp::current_run_stamp;
use serde::{Deserialize, Serialize};

/// File name used for unpartitioned tables
pub const SINGLE_FILE_NAME: &str = "part-00000.parquet";

/// Parquet compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
    Gzip,
    Uncompressed,
}

impl Compression {
    /// Codec name as DuckDB spells it
    pub fn as_sql(self) -> &'static str {
        match self {
            Compression::Snappy => "snappy",
            Compression::Zstd => "zstd",
            Compression::Gzip => "gzip",
            Compression::Uncompressed => "uncompressed",
        }
    }
}

/// Parquet writer settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParquetOptions {
    /// Compression codec
    #[serde(default)]
    pub compression: Compression,

    /// Rows per row group (engine default when unset)
    #[serde(default)]
    pub row_group_size: Option<usize>,
}

impl ParquetOptions {
    /// Create options with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compression algorithm
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set row group size
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = Some(size);
        self
    }

    /// Option list for `COPY ... (FORMAT PARQUET, <options>)`
    pub fn copy_options(&self, partition_by: &[&str]) -> String {
        let mut options = vec![format!("COMPRESSION '{}'", self.compression.as_sql())];

        if let Some(size) = self.row_group_size {
            options.push(format!("ROW_GROUP_SIZE {size}"));
        }

        if !partition_by.is_empty() {
            let columns: Vec<String> = partition_by.iter().map(|c| quote_ident(c)).collect();
            options.push(format!("PARTITION_BY ({})", columns.join(", ")));
        }

        options.join(", ")
    }
}

/// Outcome of writing one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableWriteResult {
    /// Table name (`songs`, `artists`, ...)
    pub table: String,
    /// Output directory
    pub path: String,
    /// Number of rows written
    pub rows: usize,
    /// Partition columns, outermost first
    pub partition_by: Vec<String>,
    /// Parquet files found under `path` after the write, when listed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<usize>,
}

/// Writes derived tables under one output root
pub struct TableWriter<'a> {
    session: &'a Session,
    root: Location,
    options: ParquetOptions,
}

impl<'a> TableWriter<'a> {
    /// Create a writer for an output root
    pub fn new(session: &'a Session, root: Location, options: ParquetOptions) -> Self {
        Self {
            session,
            root,
            options,
        }
    }

    /// Directory a table is written to for a given run stamp
    pub fn table_location(&self, table: &str, stamp: &str) -> Location {
        self.root.append(&format!("{table}_table.{stamp}"))
    }

    /// Write a derived table, stamped with the current local time
    pub fn write(&self, table: &DerivedTable) -> Result<TableWriteResult> {
        self.write_stamped(table, &current_run_stamp())
    }

    /// Write a derived table under an explicit run stamp
    pub fn write_stamped(&self, table: &DerivedTable, stamp: &str) -> Result<TableWriteResult> {
        let target = self.table_location(table.name, stamp);
        tracing::info!("Writing {} table as parquet to {}..", table.name, target);

        if let Location::Local { path } = &target {
            if path.exists() {
                return Err(Error::table(
                    table.name,
                    format!("output directory {} already exists", path.display()),
                ));
            }
            std::fs::create_dir_all(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
        }

        let options = self.options.copy_options(table.partition_by);
        let query = table.select_sql();

        if table.partition_by.is_empty() {
            let file = target.child(SINGLE_FILE_NAME);
            self.session.copy_to_parquet(&query, &file, &options)?;
        } else {
            self.session.copy_to_parquet(&query, &target, &options)?;
        }

        let rows = self.session.row_count(&table.relation())?;
        tracing::info!(table = table.name, rows, "Table written");

        Ok(TableWriteResult {
            table: table.name.to_string(),
            path: target.to_string(),
            rows,
            partition_by: table.partition_by.iter().map(ToString::to_string).collect(),
            files: None,
        })
    }
}
