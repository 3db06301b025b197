//! ## tidvakt-telemetry::metrics
//! **Prometheus counters for virtual time and replay rewriting**

use prometheus::{IntCounter, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub timers_fired: IntCounter,
    pub bodies_rewritten: IntCounter,
    pub timestamps_shifted: IntCounter,
    pub json_fallbacks: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let timers_fired = IntCounter::new(
            "tidvakt_timers_fired_total",
            "Virtual timer callbacks executed",
        )?;
        let bodies_rewritten = IntCounter::new(
            "tidvakt_bodies_rewritten_total",
            "Replayed bodies whose timestamps were shifted",
        )?;
        let timestamps_shifted = IntCounter::new(
            "tidvakt_timestamps_shifted_total",
            "Individual timestamps shifted by a non-zero delta",
        )?;
        let json_fallbacks = IntCounter::new(
            "tidvakt_json_fallbacks_total",
            "Bodies that failed JSON parsing and used text substitution",
        )?;

        registry.register(Box::new(timers_fired.clone()))?;
        registry.register(Box::new(bodies_rewritten.clone()))?;
        registry.register(Box::new(timestamps_shifted.clone()))?;
        registry.register(Box::new(json_fallbacks.clone()))?;

        Ok(Self {
            registry,
            timers_fired,
            bodies_rewritten,
            timestamps_shifted,
            json_fallbacks,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
