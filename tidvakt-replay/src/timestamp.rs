//! Recognition and shifting of canonical UTC timestamps.
//!
//! Only `YYYY-MM-DDTHH:mm:ss[.sss]Z` is recognized: exactly three fraction
//! digits when a fraction is present, and always a literal `Z`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const SHAPE: &str =
    r"([0-9]{4})-([0-9]{2})-([0-9]{2})T([0-9]{2}):([0-9]{2}):([0-9]{2})(?:\.([0-9]{3}))?Z";

/// Matches timestamps anywhere inside free text.
pub static TIMESTAMP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(SHAPE).expect("static timestamp pattern"));

static WHOLE_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{SHAPE}$")).expect("static timestamp pattern"));

/// Whether `value` is, in its entirety, a canonical timestamp.
pub fn is_timestamp(value: &str) -> bool {
    WHOLE_TIMESTAMP.is_match(value)
}

/// Shifts a value that is entirely a timestamp. `None` if it is not one, or
/// names an instant that does not exist (e.g. month 13).
pub fn shift_whole(value: &str, delta_ms: i64) -> Option<String> {
    let caps = WHOLE_TIMESTAMP.captures(value)?;
    shift_captures(&caps, delta_ms)
}

/// Replaces every timestamp inside `text`; returns the new text and the
/// number of timestamps that were shifted.
pub fn shift_text(text: &str, delta_ms: i64) -> (String, usize) {
    let mut shifted = 0usize;
    let out = TIMESTAMP_PATTERN.replace_all(text, |caps: &Captures| {
        match shift_captures(caps, delta_ms) {
            Some(replacement) => {
                shifted += 1;
                replacement
            }
            None => caps[0].to_owned(),
        }
    });
    (out.into_owned(), shifted)
}

fn shift_captures(caps: &Captures, delta_ms: i64) -> Option<String> {
    let has_fraction = caps.get(7).is_some();
    let instant = parse_captures(caps)?;
    let shifted = instant.checked_add_signed(Duration::try_milliseconds(delta_ms)?)?;
    Some(render(shifted, has_fraction))
}

fn parse_captures(caps: &Captures) -> Option<DateTime<Utc>> {
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = caps[1].parse::<i32>().ok()?;
    let millis = match caps.get(7) {
        Some(_) => num(7)?,
        None => 0,
    };
    let naive = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?
        .and_hms_milli_opt(num(4)?, num(5)?, num(6)?, millis)?;
    Some(naive.and_utc())
}

/// Renders in canonical form. The fraction is kept when the input had one
/// and added whenever dropping it would lose milliseconds.
fn render(instant: DateTime<Utc>, with_fraction: bool) -> String {
    if with_fraction || instant.timestamp_subsec_millis() != 0 {
        instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    } else {
        instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}
