//! DuckDB-backed query session
//!
//! One in-memory DuckDB connection per run. JSON inputs are loaded into
//! temporary tables, every derived table is materialized once, and tables are
//! copied out to Parquet from there. DuckDB parallelizes each statement
//! internally; statements themselves are issued one at a time.

use crate::config::{EtlConfig, StorageConfig};
use crate::error::{Error, Result};
use crate::output::Location;
use duckdb::arrow::datatypes::SchemaRef;
use duckdb::{Connection, Statement};

/// Name of the secret holding the S3 credentials inside the session
const S3_SECRET: &str = "lake_s3";

/// Query engine session
pub struct Session {
    /// DuckDB connection
    conn: Connection,
}

impl Session {
    /// Open an in-memory session with no remote storage configured
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::engine(format!("Failed to create DuckDB connection: {e}")))?;
        Ok(Self { conn })
    }

    /// Open a session able to reach every location in the config
    pub fn for_config(config: &EtlConfig) -> Result<Self> {
        let session = Self::in_memory()?;

        let any_remote = [config.song_data()?, config.log_data()?, config.output_root()?]
            .iter()
            .any(Location::is_remote);

        if any_remote {
            let storage = config
                .storage
                .as_ref()
                .ok_or_else(|| Error::missing_field("storage"))?;
            session.configure_storage(storage)?;
        }

        Ok(session)
    }

    /// Load httpfs and register the S3 credentials as a session secret
    pub fn configure_storage(&self, storage: &StorageConfig) -> Result<()> {
        self.conn
            .execute_batch("INSTALL httpfs; LOAD httpfs;")
            .map_err(|e| Error::engine(format!("Failed to load httpfs extension: {e}")))?;

        let mut options = vec![
            "TYPE S3".to_string(),
            format!("KEY_ID {}", quote(&storage.access_key_id)),
            format!("SECRET {}", quote(&storage.secret_access_key)),
            format!("REGION {}", quote(&storage.region)),
        ];

        // Custom endpoint (MinIO, R2, ...)
        if let Some(endpoint) = &storage.endpoint {
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/');
            options.push(format!("ENDPOINT {}", quote(host)));
            options.push("URL_STYLE 'path'".to_string());
            if endpoint.starts_with("http://") {
                options.push("USE_SSL false".to_string());
            }
        }

        let sql = format!(
            "CREATE OR REPLACE SECRET {S3_SECRET} ({});",
            options.join(", ")
        );
        self.conn
            .execute_batch(&sql)
            .map_err(|e| Error::engine(format!("Failed to configure S3 credentials: {e}")))?;

        tracing::debug!(region = %storage.region, "S3 credentials registered");
        Ok(())
    }

    /// Load newline-delimited JSON into a temporary table, schema inferred.
    ///
    /// `filter` is an optional SQL predicate applied while loading.
    pub fn load_json(&self, table: &str, location: &Location, filter: Option<&str>) -> Result<usize> {
        let mut sql = format!(
            "SELECT * FROM read_json_auto({}, union_by_name = true)",
            quote(&location.to_string())
        );
        if let Some(predicate) = filter {
            sql = format!("{sql} WHERE {predicate}");
        }

        tracing::debug!(table, %location, "Loading JSON");
        self.materialize(table, &sql)
            .map_err(|e| Error::table(table, format!("Failed to read {location}: {e}")))
    }

    /// Create (or replace) a temporary table from a query; returns its row count
    pub fn materialize(&self, table: &str, query: &str) -> Result<usize> {
        let sql = format!("CREATE OR REPLACE TEMP TABLE {table} AS {query}");
        tracing::debug!("Executing query: {}", sql);

        self.conn.execute_batch(&sql)?;
        self.row_count(table)
    }

    /// Create (or replace) an empty temporary table from a column list
    pub fn create_table(&self, table: &str, columns: &str) -> Result<()> {
        self.conn
            .execute_batch(&format!("CREATE OR REPLACE TEMP TABLE {table} ({columns})"))?;
        Ok(())
    }

    /// Prepare a statement for repeated execution
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        self.conn
            .prepare(sql)
            .map_err(|e| Error::engine(format!("Failed to prepare query: {e}")))
    }

    /// Number of rows in a table
    pub fn row_count(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// First column of a query as nullable integers
    pub fn query_i64(&self, query: &str) -> Result<Vec<Option<i64>>> {
        let mut stmt = self.conn.prepare(query)?;
        let values = stmt
            .query_map([], |row| row.get::<_, Option<i64>>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(values)
    }

    /// First column of a query as nullable strings
    pub fn query_strings(&self, query: &str) -> Result<Vec<Option<String>>> {
        let mut stmt = self.conn.prepare(query)?;
        let values = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(values)
    }

    /// Rows of a query rendered as JSON objects
    pub fn query_json(&self, query: &str) -> Result<Vec<serde_json::Value>> {
        let rows = self.query_strings(&format!("SELECT to_json(q)::VARCHAR FROM ({query}) AS q"))?;
        rows.into_iter()
            .flatten()
            .map(|row| serde_json::from_str(&row).map_err(Error::from))
            .collect()
    }

    /// Arrow schema of a table or parenthesized query
    pub fn schema(&self, relation: &str) -> Result<SchemaRef> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {relation} LIMIT 0"))?;
        let arrow = stmt.query_arrow([])?;
        Ok(arrow.get_schema())
    }

    /// Copy a query result to Parquet using DuckDB's `COPY ... TO`.
    ///
    /// `options` is the option list after `FORMAT PARQUET`, e.g.
    /// `COMPRESSION 'snappy', PARTITION_BY (year, month)`.
    pub fn copy_to_parquet(&self, query: &str, target: &Location, options: &str) -> Result<()> {
        let mut copy_sql = format!(
            "COPY ({query}) TO {} (FORMAT PARQUET",
            quote(&target.to_string())
        );
        if !options.is_empty() {
            copy_sql.push_str(", ");
            copy_sql.push_str(options);
        }
        copy_sql.push_str(");");

        tracing::debug!("Executing copy: {}", copy_sql);
        self.conn
            .execute_batch(&copy_sql)
            .map_err(|e| Error::engine(format!("Failed to write Parquet to {target}: {e}")))
    }
}

/// Quote a string as a SQL literal
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote an identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
