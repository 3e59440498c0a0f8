//! Application time zone.
//!
//! Every chat timestamp is produced in one fixed civil zone (Asia/Seoul,
//! UTC+09:00, no daylight saving) and carried as a typed `ChatTime` from
//! the store to the response. Conversion happens only at presentation
//! boundaries.

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};

/// Offset of the application time zone from UTC, in seconds.
pub const ZONE_OFFSET_SECS: i32 = 9 * 3600;

/// Timestamp in the application time zone.
pub type ChatTime = DateTime<FixedOffset>;

/// The application time zone as a chrono offset.
pub fn zone() -> FixedOffset {
    FixedOffset::east_opt(ZONE_OFFSET_SECS).expect("UTC+09:00 is a valid offset")
}

/// Current time in the application time zone, truncated to the stored
/// (microsecond) precision.
pub fn now() -> ChatTime {
    Utc::now().trunc_subsecs(6).with_timezone(&zone())
}

/// Re-express any timestamp in the application time zone.
pub fn to_zone<Tz: chrono::TimeZone>(dt: &DateTime<Tz>) -> ChatTime {
    dt.with_timezone(&zone())
}

/// Parse an RFC 3339 timestamp and normalize it to the application zone.
pub fn parse(s: &str) -> Result<ChatTime, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| to_zone(&dt))
}

/// Format a timestamp for storage (RFC 3339 with offset, microsecond precision).
///
/// Fixed precision keeps stored values lexicographically sortable.
pub fn format(dt: &ChatTime) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}
