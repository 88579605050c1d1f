//! Derived analytical tables
//!
//! Each table is declared as a [`TableDef`]: a query over the loaded source
//! tables, its ordering and its partition columns. Deriving a table
//! materializes it once in the session; writing it copies that snapshot out.
//!
//! | table     | source            | order                 | partitions        |
//! |-----------|-------------------|-----------------------|-------------------|
//! | songs     | song data         | song_id               | year, artist_id   |
//! | artists   | song data         | artist_id DESC        | none              |
//! | users     | NextSong events   | last_name             | none              |
//! | time      | NextSong events   | start_time            | year, month       |
//! | songplays | events ⨝ songs    | user_id, session_id   | year, month       |

pub mod activity;
pub mod songs;

use crate::error::{Error, Result};
use crate::output::format_schema;
use crate::session::Session;

pub use activity::{derive_activity_tables, process_log_data, ActivityTables};
pub use songs::{derive_song_tables, process_song_data, SongTables};

/// Temporary table holding the raw song dataset
pub const SONG_DATA: &str = "song_data";

/// Temporary table holding NextSong log events
pub const LOG_DATA: &str = "log_data";

/// Static definition of a derived table
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    /// Table name (`songs`, `artists`, ...)
    pub name: &'static str,
    /// SELECT producing the table, including its ORDER BY
    pub query: &'static str,
    /// ORDER BY clause reapplied when the table is written
    pub order_by: &'static str,
    /// Partition columns, outermost first
    pub partition_by: &'static [&'static str],
}

impl TableDef {
    /// Materialize the table in the session and log its schema
    pub fn derive(&self, session: &Session) -> Result<DerivedTable> {
        let relation = relation_name(self.name);
        let rows = session
            .materialize(&relation, self.query)
            .map_err(|e| Error::table(self.name, e.to_string()))?;

        let schema = session.schema(&relation)?;
        tracing::info!("{} table schema:\n{}", self.name, format_schema(&schema));
        tracing::debug!(table = self.name, rows, "Table derived");

        Ok(DerivedTable {
            name: self.name,
            order_by: self.order_by,
            partition_by: self.partition_by,
            rows,
        })
    }
}

/// A table materialized in the session, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTable {
    /// Table name
    pub name: &'static str,
    /// ORDER BY clause
    pub order_by: &'static str,
    /// Partition columns
    pub partition_by: &'static [&'static str],
    /// Row count at derivation time
    pub rows: usize,
}

impl DerivedTable {
    /// Session relation holding the rows
    pub fn relation(&self) -> String {
        relation_name(self.name)
    }

    /// Query that reads the table back in order
    pub fn select_sql(&self) -> String {
        format!("SELECT * FROM {} ORDER BY {}", self.relation(), self.order_by)
    }
}

/// Session relation name for a table
pub fn relation_name(table: &str) -> String {
    format!("{table}_table")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: TableDef = TableDef {
        name: "demo",
        query: "SELECT * FROM (VALUES (2), (1)) AS t(n) ORDER BY n",
        order_by: "n",
        partition_by: &[],
    };

    #[test]
    fn test_derive_materializes_relation() {
        let session = Session::in_memory().unwrap();
        let table = DEMO.derive(&session).unwrap();

        assert_eq!(table.rows, 2);
        assert_eq!(table.relation(), "demo_table");
        assert_eq!(table.select_sql(), "SELECT * FROM demo_table ORDER BY n");
        assert_eq!(session.row_count("demo_table").unwrap(), 2);
    }

    #[test]
    fn test_derive_reports_table_name() {
        let broken = TableDef {
            query: "SELECT * FROM missing_source",
            ..DEMO
        };
        let session = Session::in_memory().unwrap();
        let err = broken.derive(&session).unwrap_err();
        assert!(matches!(err, Error::Table { ref table, .. } if table == "demo"));
    }
}
