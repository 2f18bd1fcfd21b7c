//! Shared parsing utilities for MOAB scheduler captures.
//!
//! Attribute values in showq/showbf XML are plain strings; this crate turns
//! them into numbers and timestamps the rest of the workspace can use.

pub mod pattern;
pub mod time;

pub use pattern::{PatternError, glob_to_regex};
pub use time::{format_duration, format_epoch, month_key, parse_epoch};

/// Filter helper for optional string fields.
/// Returns None if the string is empty or a placeholder value.
pub fn non_empty_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "N/A" || trimmed == "Unknown" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse an integer attribute.
///
/// MOAB occasionally writes integral quantities with a fractional part
/// (`"3600.0"`); those are truncated. Placeholders and garbage give None.
pub fn parse_int(s: &str) -> Option<i64> {
    let trimmed = non_empty_string(s)?;
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}

/// Parse an optional integer attribute, treating a missing attribute like a placeholder.
pub fn parse_opt_int(s: Option<&str>) -> Option<i64> {
    s.and_then(parse_int)
}
