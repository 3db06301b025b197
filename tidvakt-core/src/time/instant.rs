//! Absolute-time inputs accepted by `install`, `set_system_time` and the
//! timestamp virtualizer.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

use crate::error::ClockError;

/// An absolute instant in any of the forms callers naturally hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeInput {
    DateTime(DateTime<Utc>),
    /// RFC 3339 / ISO-8601 text with an explicit offset.
    Iso(String),
    EpochMillis(i64),
}

impl TimeInput {
    /// Milliseconds since the Unix epoch.
    pub fn to_epoch_ms(&self) -> Result<i64, ClockError> {
        match self {
            TimeInput::DateTime(dt) => Ok(dt.timestamp_millis()),
            TimeInput::EpochMillis(ms) => Ok(*ms),
            TimeInput::Iso(text) => DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| dt.timestamp_millis())
                .map_err(|_| ClockError::InvalidInstant {
                    input: text.clone(),
                }),
        }
    }
}

impl From<DateTime<Utc>> for TimeInput {
    fn from(dt: DateTime<Utc>) -> Self {
        TimeInput::DateTime(dt)
    }
}

impl From<&str> for TimeInput {
    fn from(s: &str) -> Self {
        TimeInput::Iso(s.to_owned())
    }
}

impl From<String> for TimeInput {
    fn from(s: String) -> Self {
        TimeInput::Iso(s)
    }
}

impl From<i64> for TimeInput {
    fn from(ms: i64) -> Self {
        TimeInput::EpochMillis(ms)
    }
}

impl From<SystemTime> for TimeInput {
    fn from(t: SystemTime) -> Self {
        let ms = match t.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
            Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
        };
        TimeInput::EpochMillis(ms)
    }
}

/// Epoch milliseconds as a UTC date/time, if representable.
pub fn ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
