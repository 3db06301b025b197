//! Subscriber installation runs in its own binary so it cannot race the
//! `#[traced_test]` subscriber used by the unit tests.

use tidvakt_telemetry::EventLogger;

#[test]
fn init_twice_is_harmless() {
    EventLogger::init("debug");
    EventLogger::init("info");
    tracing::info!("still logging after a second init");
}
