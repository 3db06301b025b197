//! Observability configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Telemetry configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// Default tracing level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    #[validate(custom(function = validation::validate_log_level))]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}
