//! Integration tests for full job runs
//!
//! Tests the end-to-end flow: YAML config → JSON inputs on disk → Parquet
//! table directories under the output root.

use arrow::array::{Array, AsArray};
use chrono::Datelike;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sparkify_lake::cli::{Cli, Runner};
use sparkify_lake::output::SINGLE_FILE_NAME;
use sparkify_lake::{EtlConfig, Error, Pipeline, RunSummary};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Fixtures
// ============================================================================

/// Input and output directories for one test
struct Lake {
    dir: tempfile::TempDir,
}

impl Lake {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// One song per file, nested the way the song dataset is laid out
    fn add_song(&self, record: &Value) {
        let id = record["song_id"].as_str().unwrap();
        let dir = self.path().join("song_data/A/B/C");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{id}.json")), record.to_string()).unwrap();
    }

    /// A day of events in one newline-delimited file
    fn add_events(&self, day: &str, events: &[Value]) {
        let dir = self.path().join("log_data/2018/11");
        fs::create_dir_all(&dir).unwrap();
        let body: Vec<String> = events.iter().map(ToString::to_string).collect();
        fs::write(dir.join(format!("2018-11-{day}-events.json")), body.join("\n")).unwrap();
    }

    fn output(&self) -> PathBuf {
        self.path().join("out")
    }

    fn config_yaml(&self) -> String {
        format!(
            "input:\n  song_data: {root}/song_data/*/*/*/*.json\n  log_data: {root}/log_data/*/*/*.json\noutput:\n  root: {root}/out/\n",
            root = self.path().display()
        )
    }

    fn config(&self) -> EtlConfig {
        EtlConfig::from_yaml_str(&self.config_yaml()).unwrap()
    }

    fn run(&self) -> RunSummary {
        Pipeline::new(self.config()).run().unwrap()
    }
}

fn song(id: &str, artist_id: &str, artist: &str, title: &str, year: i64) -> Value {
    json!({
        "num_songs": 1,
        "artist_id": artist_id,
        "artist_latitude": 35.14968,
        "artist_longitude": -90.04892,
        "artist_location": "Memphis, TN",
        "artist_name": artist,
        "song_id": id,
        "title": title,
        "duration": 200.0,
        "year": year
    })
}

fn event(page: &str, user: &str, level: &str, artist: &str, title: &str, ts: i64, session: i64) -> Value {
    json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Jo",
        "gender": "F",
        "itemInSession": 0,
        "lastName": format!("Doe{user}"),
        "length": 200.0,
        "level": level,
        "location": "X",
        "method": "PUT",
        "page": page,
        "registration": 1_540_000_000_000_i64,
        "sessionId": session,
        "song": title,
        "status": 200,
        "ts": ts,
        "userAgent": "UA",
        "userId": user
    })
}

/// Read one string column of a Parquet file
fn read_strings(file: &Path, column: &str) -> Vec<Option<String>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(fs::File::open(file).unwrap())
        .unwrap()
        .build()
        .unwrap();

    let mut values = Vec::new();
    for batch in reader {
        let batch = batch.unwrap();
        let array = batch.column_by_name(column).unwrap().as_string::<i32>();
        for i in 0..array.len() {
            values.push((!array.is_null(i)).then(|| array.value(i).to_string()));
        }
    }
    values
}

/// Query a (possibly partitioned) table directory with DuckDB
fn query_table(dir: &str, select: &str) -> Vec<Vec<String>> {
    let conn = duckdb::Connection::open_in_memory().unwrap();
    let sql = format!(
        "SELECT {select} FROM read_parquet('{dir}/**/*.parquet', hive_partitioning = true)"
    );
    let mut stmt = conn.prepare(&sql).unwrap();
    let columns = select.split(',').count();
    stmt.query_map([], |row| {
        (0..columns)
            .map(|i| {
                let value: duckdb::types::Value = row.get(i)?;
                Ok(match value {
                    duckdb::types::Value::Text(s) => s,
                    other => format!("{other:?}"),
                })
            })
            .collect::<duckdb::Result<Vec<String>>>()
    })
    .unwrap()
    .collect::<duckdb::Result<Vec<_>>>()
    .unwrap()
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_single_matching_play() {
    let lake = Lake::new();
    lake.add_song(&json!({
        "song_id": "S1",
        "artist_id": "A1",
        "artist_name": "Artist",
        "artist_location": "",
        "artist_latitude": 0.0,
        "artist_longitude": 0.0,
        "title": "Title",
        "year": 2000,
        "duration": 200.0
    }));
    lake.add_events(
        "11",
        &[json!({
            "page": "NextSong",
            "artist": "Artist",
            "song": "Title",
            "ts": 1_000_000_000_000_i64,
            "userId": "7",
            "firstName": "Jo",
            "lastName": "Doe",
            "gender": "F",
            "level": "free",
            "sessionId": 1,
            "location": "X",
            "userAgent": "UA"
        })],
    );

    let summary = lake.run();
    let songplays = summary.table("songplays").unwrap();
    assert_eq!(songplays.rows, 1);

    let rows = query_table(&songplays.path, "song_id, artist_id, user_id");
    assert_eq!(
        rows,
        vec![vec!["S1".to_string(), "A1".to_string(), "7".to_string()]]
    );
}

#[test]
fn test_five_stamped_directories() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    lake.add_events(
        "11",
        &[event("NextSong", "1", "free", "Artist", "Title", 1_541_903_636_796, 5)],
    );

    let summary = lake.run();
    let names: Vec<&str> = summary.tables.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(names, vec!["songs", "artists", "users", "time", "songplays"]);

    for table in &summary.tables {
        let dir = PathBuf::from(&table.path);
        assert!(dir.is_dir(), "missing {}", table.path);
        assert_eq!(dir.parent().unwrap(), lake.output());

        let file_name = dir.file_name().unwrap().to_str().unwrap();
        let (prefix, stamp) = file_name.split_once('.').unwrap();
        assert_eq!(prefix, format!("{}_table", table.table));
        assert_eq!(stamp.matches('_').count(), 1, "stamp {stamp}");
        assert_eq!(stamp.matches('-').count(), 5, "stamp {stamp}");
    }

    let users = summary.table("users").unwrap();
    assert!(Path::new(&users.path).join(SINGLE_FILE_NAME).exists());
}

#[test]
fn test_partition_layout() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    lake.add_song(&song("S2", "A2", "Band", "Other", 1999));
    lake.add_events(
        "11",
        &[event("NextSong", "1", "free", "Artist", "Title", 1_541_903_636_796, 5)],
    );

    let summary = lake.run();

    let songs = PathBuf::from(&summary.table("songs").unwrap().path);
    assert!(songs.join("year=2000").join("artist_id=A1").is_dir());
    assert!(songs.join("year=1999").join("artist_id=A2").is_dir());

    let local = sparkify_lake::timestamp::normalize(1_541_903_636_796).unwrap();
    let month_dir = format!("month={}", local.local.month());
    let year_dir = format!("year={}", local.local.year());
    for table in ["time", "songplays"] {
        let dir = PathBuf::from(&summary.table(table).unwrap().path);
        assert!(dir.join(&year_dir).join(&month_dir).is_dir(), "{table}");
    }
}

#[test]
fn test_artists_file_sorted_descending() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "AR0001", "One", "First", 2000));
    lake.add_song(&song("S2", "AR0003", "Three", "Second", 2000));
    lake.add_song(&song("S3", "AR0002", "Two", "Third", 2000));
    lake.add_events(
        "11",
        &[event("NextSong", "1", "free", "One", "First", 1_541_903_636_796, 5)],
    );

    let summary = lake.run();
    let file = Path::new(&summary.table("artists").unwrap().path).join(SINGLE_FILE_NAME);

    let ids: Vec<String> = read_strings(&file, "artist_id").into_iter().flatten().collect();
    assert_eq!(ids, vec!["AR0003", "AR0002", "AR0001"]);

    let names: Vec<String> = read_strings(&file, "name").into_iter().flatten().collect();
    assert_eq!(names, vec!["Three", "Two", "One"]);
}

#[test]
fn test_only_next_song_events_reach_tables() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    lake.add_events(
        "11",
        &[
            event("NextSong", "1", "free", "Artist", "Title", 1_541_903_636_796, 5),
            event("Home", "2", "paid", "Artist", "Title", 1_541_903_700_000, 6),
            event("Settings", "3", "paid", "Artist", "Title", 1_541_903_800_000, 7),
        ],
    );

    let summary = lake.run();
    assert_eq!(summary.table("users").unwrap().rows, 1);
    assert_eq!(summary.table("time").unwrap().rows, 1);
    assert_eq!(summary.table("songplays").unwrap().rows, 1);

    let file = Path::new(&summary.table("users").unwrap().path).join(SINGLE_FILE_NAME);
    assert_eq!(read_strings(&file, "user_id"), vec![Some("1".to_string())]);
}

#[test]
fn test_users_distinct_per_level() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    lake.add_events(
        "11",
        &[
            event("NextSong", "9", "free", "Artist", "Title", 1_541_903_636_796, 5),
            event("NextSong", "9", "free", "Artist", "Title", 1_541_903_700_000, 5),
        ],
    );
    lake.add_events(
        "12",
        &[event("NextSong", "9", "paid", "Artist", "Title", 1_541_990_000_000, 8)],
    );

    let summary = lake.run();
    let file = Path::new(&summary.table("users").unwrap().path).join(SINGLE_FILE_NAME);

    let mut levels: Vec<String> = read_strings(&file, "level").into_iter().flatten().collect();
    levels.sort();
    assert_eq!(levels, vec!["free", "paid"]);
    assert_eq!(
        read_strings(&file, "user_id"),
        vec![Some("9".to_string()), Some("9".to_string())]
    );
}

#[test]
fn test_unmatched_events_are_dropped() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    lake.add_events(
        "11",
        &[
            event("NextSong", "1", "free", "Artist", "Title", 1_541_903_636_796, 5),
            event("NextSong", "2", "free", "Nobody", "Title", 1_541_903_700_000, 6),
            event("NextSong", "3", "free", "Artist", "Nothing", 1_541_903_800_000, 7),
        ],
    );

    let summary = lake.run();
    assert_eq!(summary.table("users").unwrap().rows, 3);

    let songplays = summary.table("songplays").unwrap();
    assert_eq!(songplays.rows, 1);
    let rows = query_table(&songplays.path, "user_id");
    assert_eq!(rows, vec![vec!["1".to_string()]]);
}

#[test]
fn test_written_row_order() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    let hour = 3_600_000;
    lake.add_events(
        "11",
        &[
            event("NextSong", "2", "free", "Artist", "Title", 1_541_903_636_796 + 3 * hour, 9),
            event("NextSong", "1", "free", "Artist", "Title", 1_541_903_636_796, 5),
            event("NextSong", "2", "free", "Artist", "Title", 1_541_903_636_796 + hour, 3),
            event("NextSong", "10", "free", "Artist", "Title", 1_541_903_636_796 + 2 * hour, 1),
        ],
    );

    let summary = lake.run();

    let songplays = query_table(
        &summary.table("songplays").unwrap().path,
        "user_id, CAST(session_id AS VARCHAR)",
    );
    let pairs: Vec<(&str, &str)> = songplays
        .iter()
        .map(|row| (row[0].as_str(), row[1].as_str()))
        .collect();
    assert_eq!(pairs, vec![("1", "5"), ("10", "1"), ("2", "3"), ("2", "9")]);

    let start_times: Vec<String> = query_table(&summary.table("time").unwrap().path, "start_time")
        .into_iter()
        .map(|row| row[0].clone())
        .collect();
    let mut sorted = start_times.clone();
    sorted.sort();
    assert_eq!(start_times.len(), 4);
    assert_eq!(start_times, sorted);
}

#[test]
fn test_rerun_keeps_previous_outputs() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    lake.add_events(
        "11",
        &[event("NextSong", "1", "free", "Artist", "Title", 1_541_903_636_796, 5)],
    );

    let first = lake.run();
    let artists = Path::new(&first.table("artists").unwrap().path).join(SINGLE_FILE_NAME);
    let before = fs::read(&artists).unwrap();

    let second = lake.run();

    for (a, b) in first.tables.iter().zip(&second.tables) {
        assert_ne!(a.path, b.path);
        assert!(Path::new(&a.path).is_dir());
        assert!(Path::new(&b.path).is_dir());
    }
    assert_eq!(fs::read(&artists).unwrap(), before);
    assert_eq!(fs::read_dir(lake.output()).unwrap().count(), 10);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_input_aborts() {
    let lake = Lake::new();
    lake.add_events(
        "11",
        &[event("NextSong", "1", "free", "Artist", "Title", 1_541_903_636_796, 5)],
    );

    let err = Pipeline::new(lake.config()).run().unwrap_err();
    assert!(matches!(err, Error::Table { ref table, .. } if table == "song_data"));
    assert!(!lake.output().exists());
}

#[test]
fn test_malformed_json_aborts() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    let dir = lake.path().join("log_data/2018/11");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("broken.json"), "{\"page\": \"NextSong\", ").unwrap();

    assert!(Pipeline::new(lake.config()).run().is_err());
}

#[test]
fn test_config_file_round_trip() {
    let lake = Lake::new();
    let path = lake.path().join("dl.yaml");
    fs::write(&path, lake.config_yaml()).unwrap();

    let config = EtlConfig::from_file(&path).unwrap();
    assert!(config.storage.is_none());
    assert!(config.song_data().unwrap().is_glob());
}

// ============================================================================
// CLI
// ============================================================================

#[tokio::test]
async fn test_cli_run_writes_tables() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    lake.add_events(
        "11",
        &[event("NextSong", "1", "free", "Artist", "Title", 1_541_903_636_796, 5)],
    );
    let config = lake.path().join("dl.yaml");
    fs::write(&config, lake.config_yaml()).unwrap();

    let cli = <Cli as clap::Parser>::try_parse_from([
        "sparkify-lake",
        "--config",
        config.to_str().unwrap(),
        "run",
        "--json",
    ])
    .unwrap();
    Runner::new(cli).run().await.unwrap();

    assert_eq!(fs::read_dir(lake.output()).unwrap().count(), 5);
}

#[tokio::test]
async fn test_cli_check_and_discover() {
    let lake = Lake::new();
    lake.add_song(&song("S1", "A1", "Artist", "Title", 2000));
    lake.add_events(
        "11",
        &[event("NextSong", "1", "free", "Artist", "Title", 1_541_903_636_796, 5)],
    );
    let config = lake.path().join("dl.yaml");
    fs::write(&config, lake.config_yaml()).unwrap();
    let config = config.to_str().unwrap();

    for args in [vec!["check"], vec!["discover", "--sample", "1"]] {
        let mut argv = vec!["sparkify-lake", "-c", config];
        argv.extend(args);
        let cli = <Cli as clap::Parser>::try_parse_from(argv).unwrap();
        Runner::new(cli).run().await.unwrap();
    }

    assert!(!lake.output().exists());
}

#[tokio::test]
async fn test_cli_missing_config() {
    let cli =
        <Cli as clap::Parser>::try_parse_from(["sparkify-lake", "-c", "/no/such/dl.yaml"]).unwrap();
    let err = Runner::new(cli).run().await.unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
}
