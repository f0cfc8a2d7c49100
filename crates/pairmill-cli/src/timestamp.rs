//! Timestamp parsing for chat exports.
//!
//! Exports disagree wildly on timestamp formats, so parsing tries RFC 3339
//! first and then a short list of common naive formats. Naive timestamps are
//! interpreted as UTC; the pipeline only ever subtracts timestamps, so the
//! chosen zone must merely be consistent across the file.

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime};

/// Naive formats tried after RFC 3339, in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Parse an export timestamp into UNIX epoch seconds.
///
/// # Errors
///
/// Fails when no format matches or the timestamp predates the epoch.
pub(crate) fn parse_timestamp(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return epoch_seconds(dt.timestamp());
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return epoch_seconds(naive.and_utc().timestamp());
        }
    }

    Err(anyhow::anyhow!(
        "unrecognized timestamp '{}'; expected RFC 3339 or one of {:?}",
        trimmed,
        NAIVE_FORMATS
    ))
}

fn epoch_seconds(seconds: i64) -> Result<u64> {
    u64::try_from(seconds)
        .map_err(|_| anyhow::anyhow!("timestamps before the UNIX epoch are not supported"))
}

#[cfg(test)]
mod tests {
    use super::parse_timestamp;

    #[test]
    fn parses_rfc3339_with_offset() {
        // 2023-05-01T12:00:00+07:00 == 2023-05-01T05:00:00Z
        let ts = parse_timestamp("2023-05-01T12:00:00+07:00").unwrap();
        assert_eq!(ts, 1_682_917_200);
    }

    #[test]
    fn parses_naive_datetime_as_utc() {
        let ts = parse_timestamp("2023-05-01 05:00:00").unwrap();
        assert_eq!(ts, 1_682_917_200);
    }

    #[test]
    fn parses_fractional_seconds() {
        let ts = parse_timestamp("2023-05-01 05:00:00.250").unwrap();
        assert_eq!(ts, 1_682_917_200);
    }

    #[test]
    fn parses_minute_resolution() {
        let ts = parse_timestamp("2023-05-01 05:07").unwrap();
        assert_eq!(ts, 1_682_917_200 + 7 * 60);
    }

    #[test]
    fn parses_day_first_slash_format() {
        let ts = parse_timestamp("01/05/2023 05:00").unwrap();
        assert_eq!(ts, 1_682_917_200);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let ts = parse_timestamp("  2023-05-01 05:00:00  ").unwrap();
        assert_eq!(ts, 1_682_917_200);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("yesterday-ish").is_err());
    }

    #[test]
    fn rejects_pre_epoch() {
        assert!(parse_timestamp("1969-12-31 23:59:59").is_err());
    }
}
