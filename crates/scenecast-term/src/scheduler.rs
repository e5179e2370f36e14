//! Flush pacing: debounce plus a maximum interval.
//!
//! The scheduler is a pure deadline state machine. Callers notify it on every
//! write, ask for the next deadline to sleep until, and fire it when a
//! deadline passes. Keeping time external makes the pacing logic fully
//! testable with synthetic instants.
//!
//! Rationale: the debounce collapses redundant captures while output settles;
//! the interval guarantees forward progress under continuous output so the
//! downstream pipeline keeps seeing snapshots.

use std::time::{Duration, Instant};

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
/// Default maximum interval between flushes while output is flowing.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_millis(300);

/// Dual-timer flush pacing.
#[derive(Debug)]
pub struct FlushScheduler {
    debounce: Duration,
    max_interval: Duration,
    debounce_deadline: Option<Instant>,
    interval_deadline: Option<Instant>,
    disposed: bool,
}

impl FlushScheduler {
    #[must_use]
    pub fn new(debounce: Duration, max_interval: Duration) -> Self {
        Self {
            debounce,
            max_interval,
            debounce_deadline: None,
            interval_deadline: None,
            disposed: false,
        }
    }

    /// New activity: reset the debounce timer; start the interval timer if it
    /// is not already running.
    pub fn notify(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.debounce_deadline = Some(now + self.debounce);
        if self.interval_deadline.is_none() {
            self.interval_deadline = Some(now + self.max_interval);
        }
    }

    /// The earlier of the two pending deadlines, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_deadline, self.interval_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Whether either timer is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.debounce_deadline.is_some() || self.interval_deadline.is_some()
    }

    /// If a deadline has passed, clear both timers and report that the flush
    /// callback should run. Whichever timer fires first cancels the other; a
    /// later `notify` starts a fresh cycle.
    #[must_use]
    pub fn fire_due(&mut self, now: Instant) -> bool {
        if self.disposed {
            return false;
        }
        let due = self.next_deadline().is_some_and(|deadline| deadline <= now);
        if due {
            self.debounce_deadline = None;
            self.interval_deadline = None;
        }
        due
    }

    /// Force: if either timer is active, clear both and report that the flush
    /// callback should run immediately.
    #[must_use]
    pub fn flush_pending(&mut self) -> bool {
        if self.disposed || !self.is_pending() {
            return false;
        }
        self.debounce_deadline = None;
        self.interval_deadline = None;
        true
    }

    /// Cancel both timers; subsequent `notify` is a no-op.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.debounce_deadline = None;
        self.interval_deadline = None;
    }
}

impl Default for FlushScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, DEFAULT_MAX_INTERVAL)
    }
}
