//! ## tidvakt-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! `RUST_LOG` takes precedence over the configured default level.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Later calls are no-ops, so test
    /// binaries and the CLI can both call this unconditionally.
    pub fn init(default_level: &str) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        let _ = fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Emits one structured record for a replayed interaction.
    #[inline]
    pub fn log_replay(delta_ms: i64, strategy: &str) {
        let span = tracing::debug_span!("replay", otel.kind = "INTERNAL");
        let _guard = span.enter();
        tracing::debug!(delta_ms, strategy, "Replayed response virtualized");
    }
}
