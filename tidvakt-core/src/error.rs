use thiserror::Error;
use tidvakt_config::Facility;

/// Failures while turning a duration expression into milliseconds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("Invalid duration format: {input:?} (expected <digits><unit>, e.g. \"30s\" or \"1 hour\")")]
    Format { input: String },

    #[error("Unknown duration unit {unit:?} in {input:?} (expected ms|s|m|h|d or their long forms)")]
    UnknownUnit { unit: String, input: String },

    #[error("Duration out of range: {input:?}")]
    Overflow { input: String },
}

/// Clock lifecycle and scheduling errors.
///
/// `AlreadyInstalled` and `NotInstalled` are programmer misuse and are not
/// meant to be recovered from.
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Virtual clock is already installed; uninstall it first")]
    AlreadyInstalled,

    #[error("Virtual clock is not installed")]
    NotInstalled,

    #[error("Invalid instant: {input:?}")]
    InvalidInstant { input: String },

    #[error("Negative advance is not supported: {0}ms")]
    NegativeAdvance(i64),

    #[error("Facility '{0}' is not virtualized by this clock")]
    NotVirtualized(Facility),

    #[error("Aborting after running {0} timers; assuming an infinite timer loop")]
    LoopLimit(usize),

    #[error(transparent)]
    Duration(#[from] DurationError),
}
