//! Time helpers for Unix-second timestamps.

use chrono::{DateTime, Utc};

/// Parse a Unix timestamp (seconds) attribute.
///
/// Returns None for placeholders and for values that cannot be a real epoch
/// (MOAB writes `0` for "not yet started").
pub fn parse_epoch(s: &str) -> Option<i64> {
    crate::parse_int(s).filter(|&t| t > 0)
}

/// Convert Unix seconds to a UTC datetime.
fn to_utc(epoch: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0)
}

/// Month bucket key in `MM-YYYY` form (UTC).
pub fn month_key(epoch: i64) -> String {
    to_utc(epoch)
        .map(|dt| dt.format("%m-%Y").to_string())
        .unwrap_or_else(|| "??-????".to_string())
}

/// Format a Unix timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_epoch(epoch: i64) -> String {
    to_utc(epoch)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

/// Format seconds as human-readable duration (e.g., "1d 02:30:00", "01:30:00", "05:30").
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 24 {
        let days = hours / 24;
        let hours = hours % 24;
        format!("{}d {:02}:{:02}:{:02}", days, hours, mins, secs)
    } else if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}
