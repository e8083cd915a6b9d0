//! Wall-clock helpers for step timestamps and summary metadata.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used when the host did not stamp a step itself.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

pub fn wall_time_iso_utc() -> String {
    let now = SystemTime::now();
    let dt: time::OffsetDateTime = now.into();
    dt.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
