//! Date/time utilities for docportal.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// SQLite `datetime('now')` output format.
const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp column value (stored as UTC).
///
/// Accepts both the SQLite `YYYY-MM-DD HH:MM:SS` format and RFC3339.
pub fn parse_db_datetime(datetime_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(datetime_str, SQLITE_FORMAT) {
        return Some(naive.and_utc());
    }

    DateTime::parse_from_rfc3339(datetime_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a stored UTC timestamp in the local timezone.
///
/// Returns the original string if parsing fails.
pub fn format_local(datetime_str: &str, format: &str) -> String {
    match parse_db_datetime(datetime_str) {
        Some(dt) => dt.with_timezone(&Local).format(format).to_string(),
        None => datetime_str.to_string(),
    }
}

/// Current time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
