//! Virtual clock configuration.
//!
//! Selects which time facilities the controller virtualizes and bounds
//! runaway timer chains during `flush`.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// A time-related facility the virtual clock can take over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facility {
    /// Date/time construction (`now`).
    Date,
    /// Delay-based scheduling and its cancellation.
    Timeout,
    /// Interval scheduling and its cancellation.
    Interval,
    /// Animation-frame scheduling.
    AnimationFrame,
    /// Monotonic high-resolution time since install.
    HighResolution,
    /// Microtask queue draining.
    Microtask,
}

impl Facility {
    /// Facilities virtualized when nothing else is configured.
    pub const DEFAULTS: [Facility; 4] = [
        Facility::Date,
        Facility::Timeout,
        Facility::Interval,
        Facility::HighResolution,
    ];
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facility::Date => "date",
            Facility::Timeout => "timeout",
            Facility::Interval => "interval",
            Facility::AnimationFrame => "animation_frame",
            Facility::HighResolution => "high_resolution",
            Facility::Microtask => "microtask",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ClockConfig {
    /// Facilities observed through the virtual timeline while installed.
    #[serde(default = "default_to_fake")]
    pub to_fake: Vec<Facility>,

    /// Maximum number of timers a single `flush` may fire.
    #[serde(default = "default_loop_limit")]
    #[validate(range(min = 1))]
    pub loop_limit: usize,
}

fn default_to_fake() -> Vec<Facility> {
    Facility::DEFAULTS.to_vec()
}

fn default_loop_limit() -> usize {
    1000
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            to_fake: default_to_fake(),
            loop_limit: default_loop_limit(),
        }
    }
}

impl ClockConfig {
    /// Whether `facility` is part of the virtualized set.
    pub fn fakes(&self, facility: Facility) -> bool {
        self.to_fake.contains(&facility)
    }
}
