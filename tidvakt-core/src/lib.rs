//! # tidvakt-core
//!
//! Virtual time for deterministic replay tests.
//!
//! ### Key Submodules:
//! - `time::duration`: human-readable interval parsing (`"1 hour"`, `"500ms"`)
//! - `time::instant`: absolute-time inputs (chrono values, ISO strings, epoch millis)
//! - `time::scheduler`: timer queue ordered by fire time then insertion
//! - `time::clock`: the installable `VirtualClock` controller
//!
//! A `VirtualClock` is an explicit service object. Every consumer that needs
//! "now" receives a handle to the same instance (or uses
//! [`VirtualClock::global`]); nothing patches process-wide time behind the
//! caller's back.

pub mod error;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::time::*;
}

pub use error::{ClockError, DurationError};
pub use time::clock::{SystemClock, TimeSource, VirtualClock};
pub use time::duration::{parse_duration, DurationInput};
pub use time::instant::TimeInput;
pub use time::scheduler::TimerId;
