//! Utility functions shared across modules.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::objects::Timestamp;

/// Current wallclock as unix seconds.
#[inline]
pub fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as Timestamp)
        .unwrap_or(0)
}

/// Formats a `std::time::Duration` into a human-readable string using `humantime`.
#[inline]
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

/// Formats a span of unix seconds for log output.
#[inline]
pub fn format_seconds(secs: i64) -> String {
    format_duration(Duration::from_secs(secs.max(0) as u64))
}
