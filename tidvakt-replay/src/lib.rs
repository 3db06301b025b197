//! # Tidvakt Replay
//!
//! Keeps timestamps inside replayed HTTP response bodies consistent with the
//! virtual clock.
//!
//! The replay layer hands over a saved body and the instant its interaction
//! was captured; [`TimestampVirtualizer`] shifts every ISO-8601 UTC timestamp
//! in the body by `clock.now() - captured_at`.
//!
//! ## Key Components:
//! - **timestamp**: recognition and shifting of `YYYY-MM-DDTHH:mm:ss[.sss]Z`
//! - **walk**: exclusion-aware rewrite of a parsed JSON document
//! - **virtualizer**: strategy selection, zero-delta short circuit, fallback
//! - **interaction**: the captured-interaction view and HAR helpers

pub mod error;
pub mod interaction;
pub mod timestamp;
pub mod virtualizer;
pub mod walk;

pub use error::ReplayError;
pub use interaction::{shift_har_log, CapturedInteraction};
pub use virtualizer::{rewrite, ExclusionSet, Strategy, TimestampVirtualizer};
