use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeParseError {
    #[error("could not parse '{0}' as RFC3339 or RFC2822")]
    Unrecognized(String),
}

/// Parses a timestamp string from an external source (feed `pubDate`, LLM JSON field)
/// into a concrete `DateTime<Utc>`. This is the one boundary where a string timestamp
/// gets parsed; everything downstream works with `DateTime<Utc>` directly (§9).
///
/// Accepts RFC3339 (`2024-05-01T12:00:00Z`) first, since that's what Postgres and most
/// JSON APIs emit, then falls back to RFC2822 (`Wed, 01 May 2024 12:00:00 GMT`), the
/// format most RSS `pubDate` fields use.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(TimeParseError::Unrecognized(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn parses_rfc3339_with_trailing_z() {
        let dt = parse_timestamp("2024-05-01T12:00:00Z").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 5);
    }

    #[test]
    fn parses_rfc2822_pub_date() {
        let dt = parse_timestamp("Wed, 01 May 2024 12:00:00 GMT").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.day(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("not a date").is_err());
    }
}
