//! Small helpers for RFC 3339 timestamps stored as strings.

use chrono::{DateTime, Utc};

/// Current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// True if `ts` (RFC 3339) falls on the current UTC calendar day.
///
/// Unparseable timestamps are treated as not-today.
pub fn is_today_utc(ts: &str) -> bool {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc).date_naive() == Utc::now().date_naive())
        .unwrap_or(false)
}
