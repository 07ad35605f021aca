//! Timestamp utilities

use chrono::{DateTime, Local, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds (as stored in config files) to a duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Format an upload timestamp for history listings, in local time
///
/// # Examples
///
/// ```
/// use skc_common::time::format_upload_date;
///
/// let formatted = format_upload_date(&chrono::Utc::now());
/// assert_eq!(formatted.len(), "2025-01-01 12:00".len());
/// ```
pub fn format_upload_date(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
