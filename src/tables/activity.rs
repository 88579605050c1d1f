//! Users, time and songplays tables
//!
//! Only log events with `page = 'NextSong'` are loaded. Their `ts` values are
//! normalized to local time through a lookup table with one row per distinct
//! timestamp, and the resulting `log_data_time` relation feeds the time and
//! songplays tables.

use super::{DerivedTable, TableDef, LOG_DATA, SONG_DATA};
use crate::error::{Error, Result};
use crate::output::{format_schema, Location, TableWriteResult, TableWriter};
use crate::session::Session;
use crate::timestamp;

/// Predicate selecting song play events
pub const NEXT_SONG_FILTER: &str = "page = 'NextSong'";

/// Lookup from epoch millis to local time
const LOG_TIME: &str = "log_time";

/// NextSong events with `event_time` (TIMESTAMP) and `event_datetime` (VARCHAR)
const LOG_DATA_TIME: &str = "log_data_time";

/// Distinct users; a user appears once per level they were seen with
pub const USERS: TableDef = TableDef {
    name: "users",
    query: r"
        SELECT DISTINCT
            userId AS user_id,
            firstName AS first_name,
            lastName AS last_name,
            gender,
            level
        FROM log_data
        ORDER BY last_name
    ",
    order_by: "last_name",
    partition_by: &[],
};

/// Time dimension keyed by the formatted start time.
///
/// `weekday` counts Sunday as 1 and Saturday as 7.
pub const TIME: TableDef = TableDef {
    name: "time",
    query: r#"
        SELECT DISTINCT
            event_datetime AS start_time,
            hour(event_time) AS "hour",
            day(event_time) AS "day",
            weekofyear(event_time) AS week,
            month(event_time) AS "month",
            year(event_time) AS "year",
            dayofweek(event_time) + 1 AS weekday
        FROM log_data_time
        ORDER BY start_time
    "#,
    order_by: "start_time",
    partition_by: &["year", "month"],
};

/// Song plays matched against the catalog on artist name and title.
///
/// Events without a match are dropped. `songplay_id` numbers the joined rows
/// from 0 and is only meaningful within one run.
pub const SONGPLAYS: TableDef = TableDef {
    name: "songplays",
    query: r#"
        SELECT
            songplay_id,
            start_time,
            user_id,
            level,
            song_id,
            artist_id,
            session_id,
            location,
            user_agent,
            "year",
            "month"
        FROM (
            SELECT
                row_number() OVER () - 1 AS songplay_id,
                l.event_time AS start_time,
                l.userId AS user_id,
                l.level AS level,
                s.song_id AS song_id,
                s.artist_id AS artist_id,
                l.sessionId AS session_id,
                l.location AS location,
                l.userAgent AS user_agent,
                year(l.event_time) AS "year",
                month(l.event_time) AS "month"
            FROM log_data_time AS l
            JOIN song_data AS s
              ON l.artist = s.artist_name
             AND l.song = s.title
        ) AS joined
        ORDER BY user_id, session_id
    "#,
    order_by: "user_id, session_id",
    partition_by: &["year", "month"],
};

/// Tables derived from the log dataset
#[derive(Debug, Clone)]
pub struct ActivityTables {
    pub users: DerivedTable,
    pub time: DerivedTable,
    pub songplays: DerivedTable,
}

/// Load the song and log datasets and derive users, time and songplays
pub fn derive_activity_tables(
    session: &Session,
    song_data: &Location,
    log_data: &Location,
) -> Result<ActivityTables> {
    session.load_json(SONG_DATA, song_data, None)?;
    let events = session.load_json(LOG_DATA, log_data, Some(NEXT_SONG_FILTER))?;
    tracing::info!("Log data: {events} NextSong events from {log_data}");
    let schema = session.schema(LOG_DATA)?;
    tracing::info!("Log data schema:\n{}", format_schema(&schema));

    let users = USERS.derive(session)?;

    let distinct = register_local_times(session)?;
    tracing::debug!(distinct, "Timestamps normalized");
    session.materialize(
        LOG_DATA_TIME,
        &format!(
            "SELECT l.*, epoch_ms(t.local_ms) AS event_time, t.datetime AS event_datetime \
             FROM {LOG_DATA} AS l JOIN {LOG_TIME} AS t ON CAST(l.ts AS BIGINT) = t.ts"
        ),
    )?;

    Ok(ActivityTables {
        users,
        time: TIME.derive(session)?,
        songplays: SONGPLAYS.derive(session)?,
    })
}

/// Fill the `log_time` lookup with every distinct `ts` of the loaded events.
///
/// A missing or out-of-range `ts` aborts the run.
pub fn register_local_times(session: &Session) -> Result<usize> {
    session.create_table(LOG_TIME, "ts BIGINT, local_ms BIGINT, datetime VARCHAR")?;

    let values = session.query_i64(&format!(
        "SELECT DISTINCT CAST(ts AS BIGINT) FROM {LOG_DATA}"
    ))?;

    let mut insert = session.prepare(&format!("INSERT INTO {LOG_TIME} VALUES (?, ?, ?)"))?;
    for value in &values {
        let epoch_ms = value.ok_or(Error::MissingTimestamp)?;
        // Local wall clock as epoch millis; `epoch_ms(..)` reads it back zone-less
        let local_ms = timestamp::make_timestamp(epoch_ms)?
            .and_utc()
            .timestamp_millis();
        let datetime = timestamp::make_datetime(epoch_ms)?;
        insert.execute(duckdb::params![epoch_ms, local_ms, datetime])?;
    }

    Ok(values.len())
}

/// Derive and write the users, time and songplays tables
pub fn process_log_data(
    session: &Session,
    song_data: &Location,
    log_data: &Location,
    writer: &TableWriter<'_>,
) -> Result<Vec<TableWriteResult>> {
    let tables = derive_activity_tables(session, song_data, log_data)?;
    Ok(vec![
        writer.write(&tables.users)?,
        writer.write(&tables.time)?,
        writer.write(&tables.songplays)?,
    ])
}
