//! Timestamps used in audit log names.
//!
//! Log names embed a fixed-width UTC timestamp so that lexicographic order of
//! names equals chronological order of log generations.

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};

/// `chrono` format of the timestamp component of a log name.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC time truncated to log-name precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Render a timestamp the way it appears in log names.
pub fn format_log_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(LOG_TIMESTAMP_FORMAT).to_string()
}

/// Parse the timestamp component of a log name.
///
/// Only the canonical rendering is accepted, so a parsed value always formats
/// back to the same text.
pub fn parse_log_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(input, LOG_TIMESTAMP_FORMAT).ok()?;
    let ts = naive.and_utc();
    (format_log_timestamp(ts) == input).then_some(ts)
}

/// Timestamp for a new log generation, strictly later than `after`.
pub fn next_log_timestamp(after: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now();
    match after {
        Some(prev) if prev >= now => prev + Duration::milliseconds(1),
        _ => now,
    }
}
