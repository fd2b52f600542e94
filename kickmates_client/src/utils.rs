//! Shared helpers for timestamps coming off the wire.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parses the timestamp formats the server is known to emit: RFC 3339,
/// SQLite's `datetime('now')` output and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Calendar day of a timestamp, used to bucket messages.
pub fn calendar_day(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|ts| ts.date_naive())
}
