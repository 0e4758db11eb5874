//! Time utilities for the upgrade agent
//!
//! Provides the wall-clock helpers used for the state record and for
//! rendering device timestamps in logs and CLI output.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in seconds.
///
/// Returns 0 if the system clock is set before the Unix epoch.
///
/// # Examples
/// ```
/// use ua_core::time::current_time_secs;
///
/// let now = current_time_secs();
/// assert!(now > 0);
/// ```
pub fn current_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Calculate elapsed seconds since a given Unix timestamp.
///
/// Returns 0 if the given time is in the future.
pub fn elapsed_secs(since: u64) -> u64 {
    current_time_secs().saturating_sub(since)
}

/// Render nanoseconds since the Unix epoch as an RFC 3339 UTC timestamp
pub fn format_unix_nanos(nanos: u64) -> String {
    let secs = (nanos / 1_000_000_000) as i64;
    let subsec = (nanos % 1_000_000_000) as u32;
    match DateTime::<Utc>::from_timestamp(secs, subsec) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => format!("{}ns", nanos),
    }
}

/// Render Unix seconds as an RFC 3339 UTC timestamp
pub fn format_unix_secs(secs: u64) -> String {
    format_unix_nanos(secs.saturating_mul(1_000_000_000))
}
