//! Timestamp text encoding.
//!
//! Timestamps travel as decimal epoch-millisecond strings, both on the
//! wire (`LIST` entries, `TIME`, `SELECT` replies) and in the client's
//! timestamp cache files.

use crate::error::{ProtocolError, ProtocolResult};
use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamp of a resource that does not exist or was never synced.
pub const UNKNOWN_TIMESTAMP: i64 = -1;

/// Formats an epoch-millisecond timestamp as wire text.
pub fn format_timestamp(millis: i64) -> String {
    millis.to_string()
}

/// Parses wire text into an epoch-millisecond timestamp.
///
/// `-1` is valid and denotes an unknown/absent resource.
pub fn parse_timestamp(text: &str) -> ProtocolResult<i64> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| ProtocolError::BadTimestamp {
            text: text.to_string(),
        })
}

/// Returns the current wall clock as epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(UNKNOWN_TIMESTAMP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        assert_eq!(parse_timestamp(&format_timestamp(1_700_000_000_123)).unwrap(), 1_700_000_000_123);
        assert_eq!(parse_timestamp("-1").unwrap(), UNKNOWN_TIMESTAMP);
    }

    #[test]
    fn whitespace_is_tolerated() {
        assert_eq!(parse_timestamp(" 42\n").unwrap(), 42);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ProtocolError::BadTimestamp { .. })
        ));
    }

    #[test]
    fn now_is_positive() {
        assert!(now_millis() > 0);
    }
}
