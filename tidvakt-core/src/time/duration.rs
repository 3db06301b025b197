//! Parsing for human-readable intervals (e.g. "500ms", "30 minutes", "1 hour").
//!
//! Numbers pass through untouched; strings must be `<digits><optional
//! whitespace><unit>` with nothing before or after.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DurationError;

// A unit token is either a one-letter symbol we know or a word of two or more
// letters; anything else (e.g. "2x") is a shape error rather than a bad unit.
static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([0-9]+)\s*(ms|s|m|h|d|[a-z]{2,})$").expect("static duration pattern")
});

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// A duration as callers hand it to the clock: raw milliseconds or text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationInput {
    Millis(i64),
    Text(String),
}

impl From<i64> for DurationInput {
    fn from(ms: i64) -> Self {
        DurationInput::Millis(ms)
    }
}

impl From<i32> for DurationInput {
    fn from(ms: i32) -> Self {
        DurationInput::Millis(i64::from(ms))
    }
}

impl From<u64> for DurationInput {
    fn from(ms: u64) -> Self {
        DurationInput::Millis(i64::try_from(ms).unwrap_or(i64::MAX))
    }
}

impl From<Duration> for DurationInput {
    fn from(d: Duration) -> Self {
        DurationInput::Millis(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}

impl From<&str> for DurationInput {
    fn from(s: &str) -> Self {
        DurationInput::Text(s.to_owned())
    }
}

impl From<String> for DurationInput {
    fn from(s: String) -> Self {
        DurationInput::Text(s)
    }
}

/// Converts `input` to whole milliseconds.
///
/// Numeric input is returned as given, sign included; the caller owns its
/// validity.
pub fn parse_duration(input: impl Into<DurationInput>) -> Result<i64, DurationError> {
    match input.into() {
        DurationInput::Millis(ms) => Ok(ms),
        DurationInput::Text(text) => parse_text(&text),
    }
}

fn parse_text(input: &str) -> Result<i64, DurationError> {
    let caps = DURATION_PATTERN
        .captures(input)
        .ok_or_else(|| DurationError::Format {
            input: input.to_owned(),
        })?;

    let unit = &caps[2];
    let factor = unit_factor(unit).ok_or_else(|| DurationError::UnknownUnit {
        unit: unit.to_owned(),
        input: input.to_owned(),
    })?;

    let overflow = || DurationError::Overflow {
        input: input.to_owned(),
    };
    let value: i64 = caps[1].parse().map_err(|_| overflow())?;
    value.checked_mul(factor).ok_or_else(overflow)
}

fn unit_factor(unit: &str) -> Option<i64> {
    let factor = match unit.to_ascii_lowercase().as_str() {
        "ms" | "millisecond" | "milliseconds" => 1,
        "s" | "sec" | "second" | "seconds" => MS_PER_SECOND,
        "m" | "min" | "minute" | "minutes" => MS_PER_MINUTE,
        "h" | "hr" | "hour" | "hours" => MS_PER_HOUR,
        "d" | "day" | "days" => MS_PER_DAY,
        _ => return None,
    };
    Some(factor)
}
