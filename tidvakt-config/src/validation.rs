// tidvakt-config/src/validation.rs
//! Custom validation functions for configuration.
//!
//! Shared validation logic used across the configuration modules.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref LOG_LEVEL: Regex =
        Regex::new("^(?i)(trace|debug|info|warn|error)$").expect("static log level pattern");
}

/// Validate that every exclusion key is non-empty and listed once.
pub fn validate_exclude_keys(keys: &[String]) -> Result<(), ValidationError> {
    if keys.iter().any(|k| k.is_empty()) {
        return Err(ValidationError::new("empty_exclude_key"));
    }

    let mut seen = HashSet::with_capacity(keys.len());
    if keys.iter().any(|k| !seen.insert(k.as_str())) {
        return Err(ValidationError::new("duplicate_exclude_key"));
    }
    Ok(())
}

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVEL.is_match(level) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
