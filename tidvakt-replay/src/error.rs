use thiserror::Error;
use tidvakt_core::ClockError;

/// Errors raised while reading captured interactions out of a recording.
///
/// Rewriting itself never fails; a body that cannot be handled is returned
/// as-is.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Recording entry is missing field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid capture time: {0}")]
    CaptureTime(#[from] ClockError),
}
