//! Block timestamp parsing.
//!
//! CometBFT emits RFC 3339 timestamps with nanosecond precision, e.g.
//! `2024-05-01T12:00:00.123456789Z`. Fractions longer than nine digits are
//! truncated (never rounded) before parsing.

use crate::utils::error::ParseError;
use chrono::{DateTime, FixedOffset};

const MAX_FRACTION_DIGITS: usize = 9;

/// Parse a block header timestamp
///
/// # Errors
/// * `ParseError::InvalidTimestamp` - not an RFC 3339 timestamp
pub fn parse_block_time(raw: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let normalized = truncate_fraction(raw.trim());
    DateTime::parse_from_rfc3339(&normalized)
        .map_err(|_| ParseError::InvalidTimestamp(raw.to_string()))
}

/// Seconds from `previous` to `current`, at microsecond resolution
pub fn seconds_between(previous: &DateTime<FixedOffset>, current: &DateTime<FixedOffset>) -> f64 {
    let delta = current.signed_duration_since(*previous);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

fn truncate_fraction(raw: &str) -> String {
    let Some(dot) = raw.find('.') else {
        return raw.to_string();
    };

    let digits = raw[dot + 1..]
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();

    if digits <= MAX_FRACTION_DIGITS {
        return raw.to_string();
    }

    let keep_until = dot + 1 + MAX_FRACTION_DIGITS;
    let resume_at = dot + 1 + digits;
    format!("{}{}", &raw[..keep_until], &raw[resume_at..])
}
