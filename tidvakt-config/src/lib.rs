//! # Tidvakt Configuration System
//!
//! Hierarchical configuration for the virtual clock and the response
//! timestamp virtualizer.
//!
//! ## Features
//! - **Unified Configuration**: one document covers clock, timestamps and telemetry
//! - **Validation**: runtime validation of exclusion keys and log levels
//! - **Environment Awareness**: `TIDVAKT_ENV` selects an override file

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

mod clock;
mod error;
mod telemetry;
mod timestamps;
mod validation;

pub use clock::{ClockConfig, Facility};
pub use error::ConfigError;
pub use telemetry::TelemetryConfig;
pub use timestamps::TimestampConfig;

/// Top‑level configuration container for all Tidvakt components.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct TidvaktConfig {
    /// Virtual clock behaviour.
    #[serde(default)]
    #[validate(nested)]
    pub clock: ClockConfig,

    /// Response timestamp rewriting.
    #[serde(default)]
    #[validate(nested)]
    pub timestamps: TimestampConfig,

    /// Logging parameters.
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl TidvaktConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/tidvakt.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<environment>.yaml` - Environment‑specific overrides.
    /// 4. `TIDVAKT_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(TidvaktConfig::default()));

        if Path::new("config/tidvakt.yaml").exists() {
            figment = figment.merge(Yaml::file("config/tidvakt.yaml"));
        } else {
            debug!("config/tidvakt.yaml not found, using default configuration");
        }

        let env = std::env::var("TIDVAKT_ENV").unwrap_or_else(|_| "test".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed("TIDVAKT_").split("__")))
    }

    /// Load configuration from a specific path for testing/validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(TidvaktConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed("TIDVAKT_").split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
