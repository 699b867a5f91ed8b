//! Timestamp display helpers.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Build a fixed offset from minutes east of UTC, falling back to UTC when out of range.
pub fn display_offset(utc_offset_minutes: i32) -> FixedOffset {
    utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or(Utc.fix())
}

/// Format a timestamp as `dd/mm/yyyy, HH:MM` in the given offset.
pub fn format_timestamp(timestamp: &DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp
        .with_timezone(&offset)
        .format("%d/%m/%Y, %H:%M")
        .to_string()
}
