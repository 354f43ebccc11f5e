//! Duration text used by the config file, the CLI and the snapshot log.
//!
//! Accepted input is a sequence of `<number><unit>` groups with units `h`,
//! `m`, `s` and `ms` (`"25m"`, `"1h30m"`, `"1.5m"`, `"20ms"`), optionally
//! prefixed with `-`. Output is the same form with zero components omitted.

use chrono::TimeDelta;
use std::time::Duration;
use thiserror::Error;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid number in duration {0:?}")]
    InvalidNumber(String),
    #[error("missing unit in duration {0:?} (expected h, m, s or ms)")]
    MissingUnit(String),
    #[error("unknown character {found:?} in duration {input:?}")]
    UnknownUnit { input: String, found: char },
    #[error("duration {0:?} must not be negative")]
    Negative(String),
    #[error("duration {0:?} is out of range")]
    OutOfRange(String),
}

/// Parse a signed duration.
pub fn parse(s: &str) -> Result<TimeDelta, DurationError> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.as_str()),
    };

    let mut total_ms = 0.0_f64;
    let mut num = String::new();
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        let scale = match c {
            '0'..='9' | '.' => {
                num.push(c);
                continue;
            }
            'h' => MS_PER_HOUR,
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                1
            }
            'm' => MS_PER_MINUTE,
            's' => MS_PER_SECOND,
            found => {
                return Err(DurationError::UnknownUnit {
                    input: s.clone(),
                    found,
                });
            }
        };
        let value: f64 = num
            .parse()
            .map_err(|_| DurationError::InvalidNumber(s.clone()))?;
        total_ms += value * scale as f64;
        num.clear();
    }

    if !num.is_empty() {
        return Err(DurationError::MissingUnit(s.clone()));
    }
    if !total_ms.is_finite() || total_ms >= i64::MAX as f64 {
        return Err(DurationError::OutOfRange(s.clone()));
    }

    let ms = total_ms.round() as i64;
    Ok(TimeDelta::milliseconds(if negative { -ms } else { ms }))
}

/// Parse a duration that must not be negative.
pub fn parse_std(s: &str) -> Result<Duration, DurationError> {
    let delta = parse(s)?;
    delta
        .to_std()
        .map_err(|_| DurationError::Negative(s.trim().to_string()))
}

/// Format with millisecond precision.
pub fn format(d: TimeDelta) -> String {
    format_ms(d.num_milliseconds())
}

pub fn format_std(d: Duration) -> String {
    format(to_delta(d))
}

fn format_ms(ms: i64) -> String {
    if ms == 0 {
        return "0s".into();
    }

    let mut out = String::new();
    if ms < 0 {
        out.push('-');
    }
    let mut rest = ms.unsigned_abs();
    for (unit, scale) in [
        ("h", MS_PER_HOUR as u64),
        ("m", MS_PER_MINUTE as u64),
        ("s", MS_PER_SECOND as u64),
        ("ms", 1),
    ] {
        let count = rest / scale;
        rest %= scale;
        if count > 0 {
            out.push_str(&count.to_string());
            out.push_str(unit);
        }
    }
    out
}

/// Convert an unsigned std duration into a signed delta, saturating at the
/// largest representable millisecond count.
pub fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::milliseconds(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Serde adapter for `std::time::Duration` fields written as duration text.
pub mod text {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_std(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_std(&raw).map_err(de::Error::custom)
    }
}
