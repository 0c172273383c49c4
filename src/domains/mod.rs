pub mod chat;
pub mod document;
pub mod preferences;
pub mod presentation;

use std::time::{SystemTime, UNIX_EPOCH};

use time::{macros::format_description, OffsetDateTime};

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

const TIMESTAMP_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// Formats a unix millisecond timestamp for display, falling back to the raw number.
pub fn format_timestamp(ts_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp(ts_ms.div_euclid(1000))
        .ok()
        .and_then(|dt| dt.format(TIMESTAMP_FORMAT).ok())
        .unwrap_or_else(|| ts_ms.to_string())
}
