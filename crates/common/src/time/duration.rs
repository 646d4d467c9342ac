//! Duration parsing from strings
//!
//! Configuration files express TTLs as compact strings (`"30s"`,
//! `"250ms"`, `"1h 30m"`). Components are summed, whitespace between them is
//! optional.

use std::time::Duration;

use thiserror::Error;

/// Error type for duration parsing
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DurationParseError {
    #[error("Invalid duration format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Empty duration string")]
    EmptyString,
}

/// Parse a duration string into a Duration
///
/// Supported units: `us`, `ms`, `s`, `m`, `h`, `d`, `w`. Fractions are
/// allowed (`"1.5s"`).
///
/// ```
/// use std::time::Duration;
///
/// use recache_common::time::parse_duration;
///
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_duration("1h 30m").unwrap(), Duration::from_secs(5400));
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationParseError::EmptyString);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        rest = rest.trim_start();

        let number_len =
            rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        if number_len == 0 {
            return Err(DurationParseError::InvalidFormat(format!(
                "expected number before '{}'",
                rest
            )));
        }
        let (number, tail) = rest.split_at(number_len);
        let value: f64 =
            number.parse().map_err(|_| DurationParseError::InvalidNumber(number.to_string()))?;

        let unit_len = tail.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(tail.len());
        if unit_len == 0 {
            return Err(DurationParseError::InvalidFormat(format!(
                "missing unit after '{}'",
                number
            )));
        }
        let (unit, tail) = tail.split_at(unit_len);

        let nanos_per_unit: f64 = match unit {
            "us" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            "d" => 86_400e9,
            "w" => 604_800e9,
            other => return Err(DurationParseError::UnknownUnit(other.to_string())),
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nanos = (value * nanos_per_unit).round() as u64;
        total += Duration::from_nanos(nanos);
        rest = tail;
    }

    Ok(total)
}
