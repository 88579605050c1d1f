//! Job orchestration
//!
//! One run: open a session, derive and write the songs and artists tables,
//! then derive and write the users, time and songplays tables. The first
//! failure aborts the run; tables already written stay where they are.

use crate::config::EtlConfig;
use crate::error::Result;
use crate::output::{TableWriteResult, TableWriter};
use crate::session::Session;
use crate::tables::{process_log_data, process_song_data};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// What a completed run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Local time the run started
    pub started_at: DateTime<Local>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Output root all tables were written under
    pub output_root: String,
    /// Written tables, in write order
    pub tables: Vec<TableWriteResult>,
}

impl RunSummary {
    /// Look up a written table by name
    pub fn table(&self, name: &str) -> Option<&TableWriteResult> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Total rows across all tables
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// The ETL job
pub struct Pipeline {
    config: EtlConfig,
}

impl Pipeline {
    /// Create a job from a validated config
    pub fn new(config: EtlConfig) -> Self {
        Self { config }
    }

    /// Run the job to completion; blocks until every table is written
    pub fn run(&self) -> Result<RunSummary> {
        let started_at = Local::now();
        let start = Instant::now();

        let song_data = self.config.song_data()?;
        let log_data = self.config.log_data()?;
        let output_root = self.config.output_root()?;

        let session = Session::for_config(&self.config)?;
        tracing::info!("Engine session created");

        let writer = TableWriter::new(
            &session,
            output_root.clone(),
            self.config.output.parquet.clone(),
        );

        tracing::info!("Processing songs and artists tables..");
        let mut tables = process_song_data(&session, &song_data, &writer)?;

        tracing::info!("Processing users, time and songplays tables..");
        tables.extend(process_log_data(&session, &song_data, &log_data, &writer)?);

        let summary = RunSummary {
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            output_root: output_root.to_string(),
            tables,
        };
        tracing::info!(
            tables = summary.tables.len(),
            rows = summary.total_rows(),
            duration_ms = summary.duration_ms,
            "Run complete"
        );

        Ok(summary)
    }
}
