//! Epoch-millisecond normalization and run stamps
//!
//! Log events carry `ts` as milliseconds since the Unix epoch. The derived
//! tables want the instant as a local wall-clock timestamp and as a
//! `YYYY-MM-DD HH:MM:SS` string, both in the timezone of the running process.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Timelike};

/// Format of the `start_time` string in the time table
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One epoch-millisecond value seen as a local timestamp and as a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTimestamp {
    /// Original epoch milliseconds
    pub epoch_ms: i64,
    /// Local wall-clock time, millisecond precision
    pub local: NaiveDateTime,
    /// `local` rendered with [`DATETIME_FORMAT`]
    pub formatted: String,
}

/// Normalize epoch milliseconds into the process-local timezone
pub fn normalize(epoch_ms: i64) -> Result<NormalizedTimestamp> {
    normalize_in(epoch_ms, &Local)
}

/// Normalize epoch milliseconds into an explicit timezone
pub fn normalize_in<Tz: TimeZone>(epoch_ms: i64, tz: &Tz) -> Result<NormalizedTimestamp> {
    let utc =
        DateTime::from_timestamp_millis(epoch_ms).ok_or(Error::Timestamp { value: epoch_ms })?;
    let local = utc.with_timezone(tz).naive_local();

    Ok(NormalizedTimestamp {
        epoch_ms,
        local,
        formatted: local.format(DATETIME_FORMAT).to_string(),
    })
}

/// Local timestamp for epoch milliseconds
pub fn make_timestamp(epoch_ms: i64) -> Result<NaiveDateTime> {
    normalize(epoch_ms).map(|n| n.local)
}

/// `YYYY-MM-DD HH:MM:SS` string for epoch milliseconds
pub fn make_datetime(epoch_ms: i64) -> Result<String> {
    normalize(epoch_ms).map(|n| n.formatted)
}

/// Output path suffix: `{year}-{month}-{day}_{hour}-{minute}-{second}-{microsecond}`.
///
/// Fields are not zero padded.
pub fn run_stamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    let micros = (now.nanosecond() % 1_000_000_000) / 1_000;
    format!(
        "{}-{}-{}_{}-{}-{}-{}",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        micros
    )
}

/// Run stamp for the current local time
pub fn current_run_stamp() -> String {
    run_stamp(&Local::now())
}
