use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse an RFC 2822 or RFC 3339 timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Parse a timestamp or a bare `YYYY-MM-DD` date, reading naive values as UTC.
pub fn parse_loose(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    parse_timestamp(raw)
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}
