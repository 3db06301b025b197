//! The view of a recorded interaction the virtualizer consumes.
//!
//! Recordings are HAR-shaped: each entry carries its capture instant in
//! `startedDateTime` and the saved body in `response.content.text`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use tidvakt_core::TimeInput;
use tidvakt_core::time::instant::ms_to_datetime;

use crate::error::ReplayError;
use crate::virtualizer::TimestampVirtualizer;

/// One replayed call: when it was captured and what it returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedInteraction {
    pub captured_at: DateTime<Utc>,
    pub response_body: String,
}

impl CapturedInteraction {
    pub fn new(captured_at: DateTime<Utc>, response_body: impl Into<String>) -> Self {
        Self {
            captured_at,
            response_body: response_body.into(),
        }
    }

    /// Reads a HAR log entry. A response without `content.text` has an empty
    /// body.
    pub fn from_har_entry(entry: &Value) -> Result<Self, ReplayError> {
        let started = entry
            .get("startedDateTime")
            .and_then(Value::as_str)
            .ok_or(ReplayError::MissingField("startedDateTime"))?;
        let ms = TimeInput::from(started).to_epoch_ms()?;
        let captured_at = ms_to_datetime(ms).ok_or(ReplayError::MissingField("startedDateTime"))?;

        let body = entry
            .pointer("/response/content/text")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(Self::new(captured_at, body))
    }
}

/// Rewrites the response body of every entry in a HAR document in place and
/// returns how many bodies changed.
pub fn shift_har_log(
    virtualizer: &TimestampVirtualizer,
    har: &mut Value,
) -> Result<usize, ReplayError> {
    let entries = har
        .pointer_mut("/log/entries")
        .and_then(Value::as_array_mut)
        .ok_or(ReplayError::MissingField("log.entries"))?;

    let mut changed = 0;
    for (index, entry) in entries.iter_mut().enumerate() {
        let interaction = CapturedInteraction::from_har_entry(entry)?;
        let rewritten = virtualizer.replay(&interaction);
        if rewritten == interaction.response_body {
            continue;
        }
        if let Some(text) = entry.pointer_mut("/response/content/text") {
            *text = Value::String(rewritten);
            changed += 1;
            debug!(index, "HAR entry body rewritten");
        }
    }
    Ok(changed)
}
