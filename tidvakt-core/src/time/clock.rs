//! # Virtual Clock Controller
//!
//! An installable simulated timeline. While installed, the clock reports a
//! virtual "now" that only moves when the caller advances it, and timers
//! registered through it fire on that timeline instead of the real one.
//!
//! ## Expectations:
//! - `advance(n)` is observationally equivalent to `n` ms of real elapsed time
//!   for timer logic registered here, including timers scheduled by timers
//! - Timer callbacks are awaited one at a time on the caller's task; nothing
//!   is spawned
//! - `uninstall()` drops every pending timer and microtask atomically

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use tidvakt_config::{ClockConfig, Facility};
use tidvakt_telemetry::MetricsRecorder;

use super::duration::{parse_duration, DurationInput};
use super::instant::{ms_to_datetime, TimeInput};
use super::scheduler::{Callback, OnceCallback, TimerEntry, TimerFuture, TimerId, TimerQueue};
use crate::error::ClockError;

/// Animation frames fire on 16 ms boundaries measured from the base time.
const FRAME_MS: i64 = 16;

static GLOBAL_CLOCK: Lazy<VirtualClock> = Lazy::new(VirtualClock::default);

/// Anything that can answer "what time is it" in epoch milliseconds.
pub trait TimeSource: Send + Sync {
    fn current_time_ms(&self) -> i64;

    fn current_time(&self) -> DateTime<Utc> {
        ms_to_datetime(self.current_time_ms()).unwrap_or_default()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_time_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

struct Timeline {
    base_ms: i64,
    now_ms: i64,
}

#[derive(Default)]
struct ClockState {
    config: ClockConfig,
    timeline: Option<Timeline>,
    /// Bumped on every install and uninstall so an in-flight drain can tell
    /// that the timeline it was draining is gone.
    epoch: u64,
    timers: TimerQueue,
    microtasks: VecDeque<OnceCallback>,
}

impl ClockState {
    fn timeline(&self) -> Result<&Timeline, ClockError> {
        self.timeline.as_ref().ok_or(ClockError::NotInstalled)
    }

    fn now_ms(&self) -> Result<i64, ClockError> {
        self.timeline().map(|t| t.now_ms)
    }

    fn require(&self, facility: Facility) -> Result<&Timeline, ClockError> {
        let timeline = self.timeline()?;
        if self.config.fakes(facility) {
            Ok(timeline)
        } else {
            Err(ClockError::NotVirtualized(facility))
        }
    }

    fn move_to(&mut self, ms: i64) {
        if let Some(timeline) = self.timeline.as_mut() {
            timeline.now_ms = timeline.now_ms.max(ms);
        }
    }
}

/// Handle to a virtual timeline. Clones share the same state.
#[derive(Clone, Default)]
pub struct VirtualClock {
    state: Arc<Mutex<ClockState>>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl VirtualClock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                config,
                ..ClockState::default()
            })),
            metrics: None,
        }
    }

    /// Counts fired timers into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The process-wide clock shared by test code and the replay layer.
    pub fn global() -> &'static VirtualClock {
        &GLOBAL_CLOCK
    }

    /// Replaces the facility set and loop limit. Only allowed while uninstalled.
    pub fn set_config(&self, config: ClockConfig) -> Result<(), ClockError> {
        let mut st = self.state.lock();
        if st.timeline.is_some() {
            return Err(ClockError::AlreadyInstalled);
        }
        st.config = config;
        Ok(())
    }

    pub fn config(&self) -> ClockConfig {
        self.state.lock().config.clone()
    }

    // ---- lifecycle ----

    /// Starts a virtual timeline at `base`.
    pub fn install(&self, base: impl Into<TimeInput>) -> Result<(), ClockError> {
        let base_ms = base.into().to_epoch_ms()?;
        let mut st = self.state.lock();
        if st.timeline.is_some() {
            return Err(ClockError::AlreadyInstalled);
        }
        st.timeline = Some(Timeline {
            base_ms,
            now_ms: base_ms,
        });
        st.epoch += 1;
        info!(base_ms, to_fake = ?st.config.to_fake, "Virtual clock installed");
        Ok(())
    }

    /// Returns to real time, discarding every pending timer. No-op when
    /// already uninstalled.
    pub fn uninstall(&self) {
        let (timers, microtasks) = {
            let mut st = self.state.lock();
            let Some(timeline) = st.timeline.take() else {
                return;
            };
            st.epoch += 1;
            info!(
                elapsed_ms = timeline.now_ms - timeline.base_ms,
                discarded = st.timers.len(),
                "Virtual clock uninstalled"
            );
            (
                std::mem::take(&mut st.timers),
                std::mem::take(&mut st.microtasks),
            )
        };
        // Callbacks may own clock handles; drop them outside the lock.
        drop(timers);
        drop(microtasks);
    }

    pub fn is_installed(&self) -> bool {
        self.state.lock().timeline.is_some()
    }

    // ---- queries ----

    pub fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        let ms = self.now_ms()?;
        ms_to_datetime(ms).ok_or(ClockError::InvalidInstant {
            input: ms.to_string(),
        })
    }

    pub fn now_ms(&self) -> Result<i64, ClockError> {
        self.state.lock().now_ms()
    }

    /// Virtual time passed since install.
    pub fn elapsed(&self) -> Result<Duration, ClockError> {
        let st = self.state.lock();
        let timeline = st.timeline()?;
        let ms = timeline.now_ms.saturating_sub(timeline.base_ms).max(0);
        Ok(Duration::from_millis(ms as u64))
    }

    /// Monotonic high-resolution time since install.
    pub fn hr_now(&self) -> Result<Duration, ClockError> {
        let st = self.state.lock();
        let timeline = st.require(Facility::HighResolution)?;
        let ms = timeline.now_ms.saturating_sub(timeline.base_ms).max(0);
        Ok(Duration::from_millis(ms as u64))
    }

    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    pub fn next_timer_at(&self) -> Option<DateTime<Utc>> {
        let mut st = self.state.lock();
        st.timeline.as_ref()?;
        st.timers.next_fire_at().and_then(ms_to_datetime)
    }

    /// Moves the reported time forward without firing anything.
    pub fn set_system_time(&self, at: impl Into<TimeInput>) -> Result<(), ClockError> {
        let target = at.into().to_epoch_ms()?;
        let mut st = self.state.lock();
        let now = st.require(Facility::Date)?.now_ms;
        if target < now {
            return Err(ClockError::NegativeAdvance(target - now));
        }
        st.move_to(target);
        Ok(())
    }

    // ---- scheduling ----

    /// Runs `callback` once, `delay` after the current virtual time.
    /// Negative delays count as zero.
    pub fn set_timeout<F, Fut>(
        &self,
        delay: impl Into<DurationInput>,
        callback: F,
    ) -> Result<TimerId, ClockError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = parse_duration(delay)?.max(0);
        let mut st = self.state.lock();
        let fire_at = st.require(Facility::Timeout)?.now_ms.saturating_add(delay);
        let id = st.timers.schedule(fire_at, once(callback));
        trace!(%id, fire_at, "Timeout scheduled");
        Ok(id)
    }

    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.state.lock().timers.cancel(id)
    }

    /// Runs `callback` every `period` until cleared. A zero period is treated
    /// as 1 ms.
    pub fn set_interval<F, Fut>(
        &self,
        period: impl Into<DurationInput>,
        mut callback: F,
    ) -> Result<TimerId, ClockError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = parse_duration(period)?.max(1);
        let mut st = self.state.lock();
        let fire_at = st.require(Facility::Interval)?.now_ms.saturating_add(period);
        let id = st.timers.schedule(
            fire_at,
            Callback::Repeat {
                period,
                callback: Box::new(move || -> TimerFuture { Box::pin(callback()) }),
            },
        );
        trace!(%id, fire_at, period, "Interval scheduled");
        Ok(id)
    }

    pub fn clear_interval(&self, id: TimerId) -> bool {
        self.state.lock().timers.cancel(id)
    }

    /// Runs `callback` at the next frame boundary.
    pub fn request_animation_frame<F, Fut>(&self, callback: F) -> Result<TimerId, ClockError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut st = self.state.lock();
        let timeline = st.require(Facility::AnimationFrame)?;
        let elapsed = timeline.now_ms - timeline.base_ms;
        let fire_at = timeline.base_ms + (elapsed / FRAME_MS + 1) * FRAME_MS;
        let id = st.timers.schedule(fire_at, once(callback));
        trace!(%id, fire_at, "Animation frame requested");
        Ok(id)
    }

    pub fn cancel_animation_frame(&self, id: TimerId) -> bool {
        self.state.lock().timers.cancel(id)
    }

    /// Queues `callback` to run before the next timer fires.
    pub fn queue_microtask<F, Fut>(&self, callback: F) -> Result<(), ClockError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut st = self.state.lock();
        st.require(Facility::Microtask)?;
        st.microtasks
            .push_back(Box::new(move || -> TimerFuture { Box::pin(callback()) }));
        Ok(())
    }

    // ---- driving time ----

    /// Moves time forward by `duration`, firing every timer due on the way
    /// (including ones scheduled by timers that fire) before returning.
    pub async fn advance(&self, duration: impl Into<DurationInput>) -> Result<(), ClockError> {
        let ms = parse_duration(duration)?;
        if ms < 0 {
            return Err(ClockError::NegativeAdvance(ms));
        }
        let (epoch, target) = {
            let st = self.state.lock();
            (st.epoch, st.now_ms()?.saturating_add(ms))
        };

        let fired = self.run_until(epoch, target).await;
        self.state_at_epoch(epoch, |st| st.move_to(target));
        debug!(advanced_ms = ms, fired, "Virtual clock advanced");
        Ok(())
    }

    /// Alias of [`VirtualClock::advance`].
    pub async fn tick(&self, duration: impl Into<DurationInput>) -> Result<(), ClockError> {
        self.advance(duration).await
    }

    /// Fires every pending timer regardless of delay, moving time to each
    /// timer's fire time, until the queue is empty. Fails once more than the
    /// configured loop limit of timers have fired with work still pending.
    pub async fn flush(&self) -> Result<(), ClockError> {
        let (epoch, limit) = {
            let st = self.state.lock();
            st.timeline()?;
            (st.epoch, st.config.loop_limit)
        };

        self.drain_microtasks(epoch).await;
        let mut fired = 0usize;
        loop {
            if fired >= limit && self.has_pending(epoch) {
                return Err(ClockError::LoopLimit(limit));
            }
            let Some(entry) = self.take_due(epoch, i64::MAX) else {
                break;
            };
            self.fire(epoch, entry).await;
            fired += 1;
        }
        debug!(fired, "Virtual clock flushed");
        Ok(())
    }

    /// Alias of [`VirtualClock::flush`].
    pub async fn run_all(&self) -> Result<(), ClockError> {
        self.flush().await
    }

    /// Advances to the latest timer pending right now, firing everything due
    /// up to it. Timers scheduled past that point stay pending.
    pub async fn run_to_last(&self) -> Result<(), ClockError> {
        let (epoch, target) = {
            let st = self.state.lock();
            st.timeline()?;
            (st.epoch, st.timers.last_fire_at())
        };
        let Some(target) = target else {
            return Ok(());
        };
        self.run_until(epoch, target).await;
        self.state_at_epoch(epoch, |st| st.move_to(target));
        Ok(())
    }

    /// Fires only the earliest pending timer, moving time to it.
    pub async fn run_next(&self) -> Result<bool, ClockError> {
        let epoch = {
            let st = self.state.lock();
            st.timeline()?;
            st.epoch
        };
        self.drain_microtasks(epoch).await;
        match self.take_due(epoch, i64::MAX) {
            Some(entry) => {
                self.fire(epoch, entry).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn run_microtasks(&self) -> Result<(), ClockError> {
        let epoch = {
            let st = self.state.lock();
            st.timeline()?;
            st.epoch
        };
        self.drain_microtasks(epoch).await;
        Ok(())
    }

    async fn run_until(&self, epoch: u64, limit: i64) -> usize {
        self.drain_microtasks(epoch).await;
        let mut fired = 0;
        while let Some(entry) = self.take_due(epoch, limit) {
            self.fire(epoch, entry).await;
            fired += 1;
        }
        fired
    }

    /// Pops the next due timer and moves time to it, as long as the timeline
    /// that started the drain is still installed.
    fn take_due(&self, epoch: u64, limit: i64) -> Option<TimerEntry> {
        let mut st = self.state.lock();
        if st.epoch != epoch {
            return None;
        }
        let entry = st.timers.pop_due(limit)?;
        st.move_to(entry.fire_at);
        Some(entry)
    }

    fn has_pending(&self, epoch: u64) -> bool {
        let mut st = self.state.lock();
        st.epoch == epoch && st.timers.next_fire_at().is_some()
    }

    fn state_at_epoch(&self, epoch: u64, f: impl FnOnce(&mut ClockState)) {
        let mut st = self.state.lock();
        if st.epoch == epoch {
            f(&mut *st);
        }
    }

    async fn fire(&self, epoch: u64, entry: TimerEntry) {
        let fire_at = entry.fire_at;
        let id = entry.id;
        trace!(%id, fire_at, "Firing timer");

        match entry.callback {
            Callback::Once(callback) => callback().await,
            Callback::Repeat {
                period,
                mut callback,
            } => {
                callback().await;
                let rejected = {
                    let mut st = self.state.lock();
                    if st.epoch == epoch {
                        let next = Callback::Repeat { period, callback };
                        st.timers.rearm(fire_at.saturating_add(period), id, next);
                        None
                    } else {
                        Some(callback)
                    }
                };
                drop(rejected);
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.timers_fired.inc();
        }
        self.drain_microtasks(epoch).await;
    }

    async fn drain_microtasks(&self, epoch: u64) {
        loop {
            let task = {
                let mut st = self.state.lock();
                if st.epoch != epoch {
                    return;
                }
                st.microtasks.pop_front()
            };
            match task {
                Some(task) => task().await,
                None => return,
            }
        }
    }
}

impl TimeSource for VirtualClock {
    /// Virtual time while installed with the `date` facility, real time
    /// otherwise.
    fn current_time_ms(&self) -> i64 {
        let st = self.state.lock();
        match &st.timeline {
            Some(timeline) if st.config.fakes(Facility::Date) => timeline.now_ms,
            _ => Utc::now().timestamp_millis(),
        }
    }
}

fn once<F, Fut>(callback: F) -> Callback
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Callback::Once(Box::new(move || -> TimerFuture { Box::pin(callback()) }))
}
