//! Timer queue for the virtual clock.
//!
//! A min-heap of pending callbacks ordered by fire time, then by insertion
//! sequence so that timers due at the same instant run in the order they were
//! scheduled. Cancellation is lazy: cancelled ids are dropped from the active
//! set and their heap entries are discarded when they reach the top.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// The future a timer callback returns; the clock awaits it before moving on.
pub type TimerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub(crate) type OnceCallback = Box<dyn FnOnce() -> TimerFuture + Send + 'static>;
pub(crate) type RepeatCallback = Box<dyn FnMut() -> TimerFuture + Send + 'static>;

/// Handle returned by the scheduling calls, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

pub(crate) enum Callback {
    Once(OnceCallback),
    Repeat { period: i64, callback: RepeatCallback },
}

pub(crate) struct TimerEntry {
    pub fire_at: i64,
    pub id: TimerId,
    seq: u64,
    pub callback: Callback,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest fire time, then oldest)
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub(crate) struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    active: HashSet<TimerId>,
    next_id: u64,
    next_seq: u64,
}

impl TimerQueue {
    pub fn schedule(&mut self, fire_at: i64, callback: Callback) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.active.insert(id);
        self.push(fire_at, id, callback);
        id
    }

    /// Puts a fired interval back in the queue under its original id, unless
    /// it was cancelled while its callback ran.
    pub fn rearm(&mut self, fire_at: i64, id: TimerId, callback: Callback) -> bool {
        if !self.active.contains(&id) {
            return false;
        }
        self.push(fire_at, id, callback);
        true
    }

    fn push(&mut self, fire_at: i64, id: TimerId, callback: Callback) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimerEntry {
            fire_at,
            id,
            seq,
            callback,
        });
    }

    /// Returns whether `id` was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.active.remove(&id)
    }

    /// Pops the earliest live timer if it is due at or before `limit`.
    ///
    /// One-shot timers leave the active set here; intervals stay active until
    /// cancelled.
    pub fn pop_due(&mut self, limit: i64) -> Option<TimerEntry> {
        self.discard_cancelled();
        if self.heap.peek()?.fire_at > limit {
            return None;
        }
        let entry = self.heap.pop()?;
        if matches!(entry.callback, Callback::Once(_)) {
            self.active.remove(&entry.id);
        }
        Some(entry)
    }

    pub fn next_fire_at(&mut self) -> Option<i64> {
        self.discard_cancelled();
        self.heap.peek().map(|e| e.fire_at)
    }

    pub fn last_fire_at(&self) -> Option<i64> {
        self.heap
            .iter()
            .filter(|e| self.active.contains(&e.id))
            .map(|e| e.fire_at)
            .max()
    }

    pub fn len(&self) -> usize {
        self.heap
            .iter()
            .filter(|e| self.active.contains(&e.id))
            .count()
    }

    fn discard_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.active.contains(&top.id) {
                break;
            }
            self.heap.pop();
        }
    }
}
