//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::{EtlConfig, StorageConfig};
use crate::error::{Error, Result};
use crate::output::{format_schema, Location, StorageClient, SINGLE_FILE_NAME};
use crate::pipeline::{Pipeline, RunSummary};
use crate::session::Session;
use crate::tables::{activity::NEXT_SONG_FILTER, LOG_DATA, SONG_DATA};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match self.cli.command.clone().unwrap_or_default() {
            Commands::Run { json } => self.run_job(json).await,
            Commands::Check => self.check().await,
            Commands::Discover { sample } => self.discover(sample).await,
        }
    }

    /// Load configuration
    fn load_config(&self) -> Result<EtlConfig> {
        tracing::debug!(path = %self.cli.config.display(), "Loading config");
        EtlConfig::from_file(&self.cli.config)
    }

    /// Run the job and print its summary
    async fn run_job(&self, json: bool) -> Result<()> {
        let config = self.load_config()?;
        let storage = config.storage.clone();

        let mut summary = tokio::task::spawn_blocking(move || Pipeline::new(config).run())
            .await
            .map_err(|e| Error::Other(format!("Pipeline task failed: {e}")))??;

        count_written_files(&mut summary, storage.as_ref()).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }
        Ok(())
    }

    /// Check that every configured location is reachable
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        println!("Config OK: {}", self.cli.config.display());

        let storage = config.storage.as_ref();
        for (label, location) in [
            ("song data", config.song_data()?),
            ("log data", config.log_data()?),
        ] {
            let entries = StorageClient::new(&location, storage)?.probe().await?;
            println!("  {label}: {location} ({entries} entries)");
        }

        let output_root = config.output_root()?;
        match &output_root {
            Location::Local { path } if !path.exists() => {
                println!("  output: {output_root} (will be created)");
            }
            _ => {
                let entries = StorageClient::new(&output_root, storage)?.probe().await?;
                println!("  output: {output_root} ({entries} entries)");
            }
        }

        Ok(())
    }

    /// Load both inputs and print their schemas
    async fn discover(&self, sample: usize) -> Result<()> {
        let config = self.load_config()?;

        let report = tokio::task::spawn_blocking(move || discover_inputs(&config, sample))
            .await
            .map_err(|e| Error::Other(format!("Discover task failed: {e}")))??;

        print!("{report}");
        Ok(())
    }
}

/// Load the inputs into a fresh session and render schemas, counts and samples
fn discover_inputs(config: &EtlConfig, sample: usize) -> Result<String> {
    let session = Session::for_config(config)?;
    let song_data = config.song_data()?;
    let log_data = config.log_data()?;

    let songs = session.load_json(SONG_DATA, &song_data, None)?;
    let events = session.load_json("raw_log_data", &log_data, None)?;
    let next_songs = session.materialize(
        LOG_DATA,
        &format!("SELECT * FROM raw_log_data WHERE {NEXT_SONG_FILTER}"),
    )?;

    let mut report = format!("Song data: {song_data} ({songs} records)\n");
    let song_schema = session.schema(SONG_DATA)?;
    report.push_str(&format_schema(&song_schema));
    report.push_str(&format!(
        "\nLog data: {log_data} ({events} events, {next_songs} NextSong)\n"
    ));
    let log_schema = session.schema("raw_log_data")?;
    report.push_str(&format_schema(&log_schema));

    if sample > 0 {
        report.push_str(&format!("\nFirst {sample} NextSong events:\n"));
        for row in session.query_json(&format!("SELECT * FROM {LOG_DATA} LIMIT {sample}"))? {
            report.push_str(&serde_json::to_string(&row)?);
            report.push('\n');
        }
    }

    Ok(report)
}

/// Fill in the number of Parquet files each table produced.
///
/// Listing is informational; a failure only logs a warning.
async fn count_written_files(summary: &mut RunSummary, storage: Option<&StorageConfig>) {
    for table in &mut summary.tables {
        let counted = match Location::parse(&table.path) {
            Ok(location) => match StorageClient::new(&location, storage) {
                Ok(client) => client.count_files(".parquet").await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match counted {
            Ok(files) => table.files = Some(files),
            Err(e) => tracing::warn!(table = %table.table, "Could not list output files: {e}"),
        }
    }
}

/// Print a human-readable run summary
fn print_summary(summary: &RunSummary) {
    println!(
        "Wrote {} tables under {} in {}ms",
        summary.tables.len(),
        summary.output_root,
        summary.duration_ms
    );
    for table in &summary.tables {
        let layout = if table.partition_by.is_empty() {
            SINGLE_FILE_NAME.to_string()
        } else {
            format!("partitioned by {}", table.partition_by.join(", "))
        };
        let files = table
            .files
            .map(|n| format!(", {n} files"))
            .unwrap_or_default();
        println!(
            "  {:<10} {:>10} rows  {} ({layout}{files})",
            table.table, table.rows, table.path
        );
    }
}
