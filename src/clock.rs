//! Wall-clock helpers expressed in epoch milliseconds.

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Milliseconds elapsed since the Unix epoch.
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Render an epoch-milliseconds instant as RFC 3339.
pub fn format_ms(ms: i64) -> Option<String> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|instant| instant.format(&Rfc3339).ok())
}

/// Parse an RFC 3339 date (or a bare `YYYY-MM-DD` day) into epoch milliseconds.
pub fn parse_ms(text: &str) -> Option<i64> {
    let text = text.trim();
    let parsed = OffsetDateTime::parse(text, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(&format!("{text}T00:00:00Z"), &Rfc3339))
        .ok()?;
    Some((parsed.unix_timestamp_nanos() / 1_000_000) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_and_parses_round_trip() {
        let formatted = format_ms(1_700_000_000_000).unwrap();
        assert_eq!(formatted, "2023-11-14T22:13:20Z");
        assert_eq!(parse_ms(&formatted), Some(1_700_000_000_000));
    }

    #[test]
    fn parses_bare_days() {
        assert_eq!(parse_ms("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_ms("yesterday"), None);
    }
}
