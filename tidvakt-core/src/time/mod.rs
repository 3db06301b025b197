//! ## tidvakt-core::time
//! **Virtual clock & timer scheduling**

pub mod clock;
pub mod duration;
pub mod instant;
pub mod scheduler;

pub use clock::{SystemClock, TimeSource, VirtualClock};
pub use duration::{parse_duration, DurationInput};
pub use instant::TimeInput;
pub use scheduler::{TimerFuture, TimerId};
