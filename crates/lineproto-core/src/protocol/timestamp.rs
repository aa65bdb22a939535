use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use super::ParseError;

/// Source of the ingestion time stamped on lines without a timestamp.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_millis().min(i64::MAX as u128) as i64,
            Err(before_epoch) => -(before_epoch.duration().as_millis().min(i64::MAX as u128) as i64),
        }
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Unit of the timestamps carried by a write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl Precision {
    /// Resolves the `precision` request parameter; unknown or missing values
    /// mean milliseconds.
    pub fn from_param(param: Option<&str>) -> Self {
        param
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Signed factor converting this unit to milliseconds.
    ///
    /// Positive values multiply, negative values divide by their magnitude.
    pub const fn multiplier(self) -> i64 {
        match self {
            Self::Nanoseconds => -1_000_000,
            Self::Microseconds => -1_000,
            Self::Milliseconds => 1,
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
            Self::Hours => 3_600_000,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "us",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
        }
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ns" => Ok(Self::Nanoseconds),
            "us" => Ok(Self::Microseconds),
            "ms" => Ok(Self::Milliseconds),
            "s" => Ok(Self::Seconds),
            "m" => Ok(Self::Minutes),
            "h" => Ok(Self::Hours),
            other => Err(format!(
                "unknown precision '{other}'; expected one of ns, us, ms, s, m, h"
            )),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multiplier for a raw `precision` parameter.
pub fn precision_multiplier(param: Option<&str>) -> i64 {
    Precision::from_param(param).multiplier()
}

/// Converts the timestamp segment starting at `start` to epoch milliseconds.
///
/// When nothing but at most one trailing byte remains, the line carries no
/// timestamp and the ingestion time from `clock` is used.
pub fn normalize(
    buf: &[u8],
    start: usize,
    multiplier: i64,
    clock: &dyn Clock,
) -> Result<i64, ParseError> {
    if start + 1 >= buf.len() {
        return Ok(clock.now_millis());
    }

    let raw = std::str::from_utf8(&buf[start..])
        .ok()
        .and_then(|digits| digits.parse::<i64>().ok())
        .ok_or(ParseError::BadTimestamp)?;

    match multiplier {
        m if m > 0 => raw.checked_mul(m).ok_or(ParseError::BadTimestamp),
        m if m < 0 => Ok(raw / m.unsigned_abs() as i64),
        _ => Ok(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: FixedClock = FixedClock(1_700_000_000_000);

    #[test]
    fn precision_table() {
        let table = [
            ("ns", -1_000_000),
            ("us", -1_000),
            ("ms", 1),
            ("s", 1_000),
            ("m", 60_000),
            ("h", 3_600_000),
            ("NS", -1_000_000),
            ("fortnight", 1),
            ("", 1),
        ];
        for (param, expected) in table {
            assert_eq!(precision_multiplier(Some(param)), expected, "precision {param}");
        }
        assert_eq!(precision_multiplier(None), 1);
    }

    #[test]
    fn nanoseconds_divide_down_to_millis() {
        let line = b"1465839830100400200";
        assert_eq!(normalize(line, 0, -1_000_000, &NOW), Ok(1_465_839_830_100));
    }

    #[test]
    fn seconds_multiply_up() {
        assert_eq!(normalize(b"x 1465839830", 2, 1_000, &NOW), Ok(1_465_839_830_000));
    }

    #[test]
    fn missing_timestamp_uses_clock() {
        assert_eq!(normalize(b"cpu v=1", 7, 1, &NOW), Ok(NOW.0));
        assert_eq!(normalize(b"cpu v=1 ", 8, 1, &NOW), Ok(NOW.0));
    }

    #[test]
    fn bad_timestamps() {
        assert_eq!(normalize(b" 12ab", 1, 1, &NOW), Err(ParseError::BadTimestamp));
        assert_eq!(normalize(b" 1.5", 1, 1, &NOW), Err(ParseError::BadTimestamp));
        assert_eq!(
            normalize(b" 9223372036854775807", 1, 1_000, &NOW),
            Err(ParseError::BadTimestamp)
        );
    }

    #[test]
    fn negative_timestamps_are_accepted() {
        assert_eq!(normalize(b" -5000", 1, 1, &NOW), Ok(-5000));
        assert_eq!(normalize(b" -5000000", 1, -1_000, &NOW), Ok(-5000));
    }
}
