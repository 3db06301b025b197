//! Response timestamp virtualization settings.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TimestampConfig {
    /// Rewrite timestamps in replayed bodies at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON object keys whose values are never rewritten.
    #[serde(default)]
    #[validate(custom(function = validation::validate_exclude_keys))]
    pub exclude_keys: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            exclude_keys: Vec::new(),
        }
    }
}
