//! # Tidvakt Telemetry
//!
//! Crate for logging initialisation and Prometheus counters shared by the
//! clock and the timestamp virtualizer.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
