//! # Timestamp Virtualizer
//!
//! Shifts timestamps in a replayed body by `clock.now() - captured_at`.
//!
//! Without exclusions the body is treated as opaque text and every embedded
//! timestamp is substituted. With exclusions the body is parsed as JSON and
//! walked so excluded keys can be honoured; if parsing fails the text path is
//! used instead. Rewriting never fails: anything it cannot handle comes back
//! unchanged.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use tidvakt_config::TimestampConfig;
use tidvakt_core::{TimeInput, VirtualClock};
use tidvakt_telemetry::{EventLogger, MetricsRecorder};

use crate::interaction::CapturedInteraction;
use crate::timestamp::shift_text;
use crate::walk::shift_value;

/// Object keys whose values are never rewritten, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    keys: Vec<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// How a body was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Returned as given.
    Unchanged,
    /// Regex substitution over raw text.
    Text,
    /// JSON walk honouring exclusions.
    Structured,
    /// JSON parsing failed; fell back to text substitution.
    TextFallback,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Unchanged => "unchanged",
            Strategy::Text => "text",
            Strategy::Structured => "structured",
            Strategy::TextFallback => "text_fallback",
        })
    }
}

#[derive(Debug)]
struct Outcome {
    strategy: Strategy,
    delta_ms: i64,
    shifted: usize,
}

impl Outcome {
    fn unchanged() -> Self {
        Self {
            strategy: Strategy::Unchanged,
            delta_ms: 0,
            shifted: 0,
        }
    }
}

/// Rewrites `body` against `clock`, honouring `exclusions` when non-empty.
///
/// The body comes back borrowed, byte for byte, when `enabled` is false, the
/// clock is not installed, `captured_at` is unusable, or no time has passed
/// since capture.
pub fn rewrite<'a>(
    clock: &VirtualClock,
    body: &'a str,
    captured_at: impl Into<TimeInput>,
    exclusions: &ExclusionSet,
    enabled: bool,
) -> Cow<'a, str> {
    rewrite_inner(clock, body, captured_at.into(), exclusions, enabled).0
}

fn rewrite_inner<'a>(
    clock: &VirtualClock,
    body: &'a str,
    captured_at: TimeInput,
    exclusions: &ExclusionSet,
    enabled: bool,
) -> (Cow<'a, str>, Outcome) {
    if !enabled {
        return (Cow::Borrowed(body), Outcome::unchanged());
    }
    let Ok(now_ms) = clock.now_ms() else {
        return (Cow::Borrowed(body), Outcome::unchanged());
    };
    let captured_ms = match captured_at.to_epoch_ms() {
        Ok(ms) => ms,
        Err(err) => {
            debug!(%err, "Capture time unusable; body left as recorded");
            return (Cow::Borrowed(body), Outcome::unchanged());
        }
    };

    let delta_ms = now_ms.saturating_sub(captured_ms);
    if delta_ms == 0 {
        return (Cow::Borrowed(body), Outcome::unchanged());
    }

    if exclusions.is_empty() {
        let (text, shifted) = shift_text(body, delta_ms);
        let outcome = Outcome {
            strategy: Strategy::Text,
            delta_ms,
            shifted,
        };
        return (Cow::Owned(text), outcome);
    }

    match serde_json::from_str::<Value>(body) {
        Ok(mut doc) => {
            let shifted = shift_value(&mut doc, None, delta_ms, exclusions);
            let outcome = Outcome {
                strategy: Strategy::Structured,
                delta_ms,
                shifted,
            };
            match serde_json::to_string(&doc) {
                Ok(text) => (Cow::Owned(text), outcome),
                Err(err) => {
                    debug!(%err, "Re-serialization failed; body left as recorded");
                    (Cow::Borrowed(body), Outcome::unchanged())
                }
            }
        }
        Err(err) => {
            debug!(%err, "Body is not JSON; falling back to text substitution");
            let (text, shifted) = shift_text(body, delta_ms);
            let outcome = Outcome {
                strategy: Strategy::TextFallback,
                delta_ms,
                shifted,
            };
            (Cow::Owned(text), outcome)
        }
    }
}

/// Rewrites replayed bodies against a shared clock with a fixed
/// configuration.
#[derive(Clone)]
pub struct TimestampVirtualizer {
    clock: VirtualClock,
    enabled: bool,
    exclusions: ExclusionSet,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl TimestampVirtualizer {
    pub fn new(clock: VirtualClock, config: &TimestampConfig) -> Self {
        Self {
            clock,
            enabled: config.enabled,
            exclusions: ExclusionSet::new(config.exclude_keys.iter().cloned()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Rewrites `body`, captured at `captured_at`, using the configured
    /// exclusions and enabled flag.
    pub fn rewrite<'a>(&self, body: &'a str, captured_at: impl Into<TimeInput>) -> Cow<'a, str> {
        let (text, outcome) = rewrite_inner(
            &self.clock,
            body,
            captured_at.into(),
            &self.exclusions,
            self.enabled,
        );
        self.record(&outcome);
        text
    }

    /// Rewrites the saved response of one replayed interaction.
    pub fn replay(&self, interaction: &CapturedInteraction) -> String {
        self.rewrite(&interaction.response_body, interaction.captured_at)
            .into_owned()
    }

    fn record(&self, outcome: &Outcome) {
        if outcome.strategy == Strategy::Unchanged {
            return;
        }
        EventLogger::log_replay(outcome.delta_ms, &outcome.strategy.to_string());
        debug!(shifted = outcome.shifted, "Timestamps shifted");

        if let Some(metrics) = &self.metrics {
            metrics.bodies_rewritten.inc();
            metrics.timestamps_shifted.inc_by(outcome.shifted as u64);
            if outcome.strategy == Strategy::TextFallback {
                metrics.json_fallbacks.inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const T: &str = "2024-01-01T00:00:00Z";

    fn clock_at(base: &str) -> VirtualClock {
        let clock = VirtualClock::default();
        clock.install(base).unwrap();
        clock
    }

    fn virtualizer(clock: &VirtualClock, exclude: &[&str]) -> TimestampVirtualizer {
        let config = TimestampConfig {
            enabled: true,
            exclude_keys: exclude.iter().map(|k| k.to_string()).collect(),
        };
        TimestampVirtualizer::new(clock.clone(), &config)
    }

    #[test]
    fn built_from_config() {
        let clock = clock_at(T);
        let v = virtualizer(&clock, &["birthDate", "issuedOn"]);
        assert!(v.is_enabled());
        assert_eq!(v.exclusions().keys(), ["birthDate", "issuedOn"]);
        assert!(v.exclusions().contains("issuedOn"));
        assert_eq!(v.clock().now_ms().unwrap(), clock.now_ms().unwrap());
    }

    #[test]
    fn zero_delta_returns_the_exact_input() {
        let clock = clock_at(T);
        let body = "{ \"createdAt\" : \"2024-01-01T00:00:00Z\",\n  \"n\": 1.50 }";

        let plain = virtualizer(&clock, &[]).rewrite(body, T);
        assert!(matches!(plain, Cow::Borrowed(_)));
        assert_eq!(plain, body);

        let structured = virtualizer(&clock, &["n"]).rewrite(body, T);
        assert!(matches!(structured, Cow::Borrowed(_)));
        assert_eq!(structured, body);
    }

    #[tokio::test]
    async fn delta_tracks_the_clock() {
        let clock = clock_at(T);
        clock.advance("90 minutes").await.unwrap();
        let out = virtualizer(&clock, &[]).rewrite(r#"{"createdAt":"2024-01-01T00:00:00Z"}"#, T);
        assert_eq!(out, r#"{"createdAt":"2024-01-01T01:30:00Z"}"#);
    }

    #[tokio::test]
    async fn exclusions_are_respected() {
        let clock = clock_at(T);
        clock.advance("1 day").await.unwrap();
        let body = r#"{"birthDate":"2024-01-01T00:00:00Z","createdAt":"2024-01-01T00:00:00Z"}"#;
        let out = virtualizer(&clock, &["birthDate"]).rewrite(body, T);
        assert_eq!(
            out,
            r#"{"birthDate":"2024-01-01T00:00:00Z","createdAt":"2024-01-02T00:00:00Z"}"#
        );
    }

    #[tokio::test]
    async fn non_json_bodies_fall_back_to_text() {
        let clock = clock_at(T);
        clock.advance("5s").await.unwrap();
        let body = "<expires>2024-01-01T00:00:00.000Z</expires>";
        let out = virtualizer(&clock, &["birthDate"]).rewrite(body, T);
        assert_eq!(out, "<expires>2024-01-01T00:00:05.000Z</expires>");
    }

    #[test]
    fn capture_time_may_be_in_the_past() {
        let clock = clock_at("2024-01-01T12:00:00Z");
        let out = virtualizer(&clock, &[]).rewrite("seen 2024-01-01T00:00:00Z", T);
        assert_eq!(out, "seen 2024-01-01T12:00:00Z");
    }

    #[test]
    fn disabled_or_uninstalled_is_a_no_op() {
        let clock = clock_at("2024-06-01T00:00:00Z");
        let config = TimestampConfig {
            enabled: false,
            exclude_keys: vec![],
        };
        let off = TimestampVirtualizer::new(clock.clone(), &config);
        assert_eq!(off.rewrite(T, T), T);

        clock.uninstall();
        assert_eq!(virtualizer(&clock, &[]).rewrite(T, T), T);
    }

    #[test]
    fn unusable_capture_time_leaves_body_alone() {
        let clock = clock_at("2024-06-01T00:00:00Z");
        let out = virtualizer(&clock, &[]).rewrite(T, "last tuesday");
        assert_eq!(out, T);
    }

    #[test]
    fn free_function_matches_the_bound_form() {
        let clock = clock_at("2024-01-01T00:00:10Z");
        let exclusions = ExclusionSet::new(["keep"]);
        let body = r#"{"keep":"2024-01-01T00:00:00Z","move":"2024-01-01T00:00:00Z"}"#;
        assert_eq!(
            rewrite(&clock, body, T, &exclusions, true),
            r#"{"keep":"2024-01-01T00:00:00Z","move":"2024-01-01T00:00:10Z"}"#
        );
        assert_eq!(rewrite(&clock, body, T, &exclusions, false), body);
    }

    #[test]
    fn metrics_record_strategy() {
        let clock = clock_at("2024-01-01T00:00:01Z");
        let metrics = Arc::new(MetricsRecorder::new().unwrap());
        let v = virtualizer(&clock, &["x"]).with_metrics(metrics.clone());

        v.rewrite(r#"["2024-01-01T00:00:00Z","2024-01-01T00:00:00Z"]"#, T);
        v.rewrite("not json 2024-01-01T00:00:00Z", T);

        assert_eq!(metrics.bodies_rewritten.get(), 2);
        assert_eq!(metrics.timestamps_shifted.get(), 3);
        assert_eq!(metrics.json_fallbacks.get(), 1);
    }

    #[traced_test]
    #[test]
    fn fallback_is_logged_not_raised() {
        let clock = clock_at("2024-01-01T00:00:01Z");
        let out = virtualizer(&clock, &["x"]).rewrite("{broken 2024-01-01T00:00:00Z", T);
        assert_eq!(out, "{broken 2024-01-01T00:00:01Z");
        assert!(logs_contain("falling back to text substitution"));
    }
}
