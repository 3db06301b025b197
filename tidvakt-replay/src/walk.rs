//! Exclusion-aware timestamp rewrite over a parsed JSON document.

use serde_json::Value;

use crate::timestamp::shift_whole;
use crate::virtualizer::ExclusionSet;

/// Shifts every timestamp string in `value` by `delta_ms` and returns how
/// many were shifted.
///
/// `key` is the object key `value` sits under, if any. A value under an
/// excluded key is left untouched whatever its type; array items carry no
/// key, so exclusions only ever match direct object keys.
pub fn shift_value(
    value: &mut Value,
    key: Option<&str>,
    delta_ms: i64,
    exclusions: &ExclusionSet,
) -> usize {
    if key.is_some_and(|k| exclusions.contains(k)) {
        return 0;
    }

    match value {
        Value::String(s) => match shift_whole(s, delta_ms) {
            Some(shifted) => {
                *s = shifted;
                1
            }
            None => 0,
        },
        Value::Array(items) => items
            .iter_mut()
            .map(|item| shift_value(item, None, delta_ms, exclusions))
            .sum(),
        Value::Object(map) => map
            .iter_mut()
            .map(|(k, v)| shift_value(v, Some(k.as_str()), delta_ms, exclusions))
            .sum(),
        Value::Null | Value::Bool(_) | Value::Number(_) => 0,
    }
}
