//! The virtual terminal: bytes in, deduplicated snapshot callbacks out.
//!
//! [`VirtualTerm`] owns an [`Emulator`], a [`FlushScheduler`], and the
//! previous emitted snapshot. Writes feed the emulator and notify the
//! scheduler; when a deadline passes ([`VirtualTerm::pump`]) or a flush is
//! forced, a capture runs: snapshot, compare with the last emitted snapshot
//! (timestamp ignored), and invoke the change callback only on inequality.
//!
//! # Capture collapse
//!
//! Only one capture runs at a time. If the change callback re-enters the
//! terminal (writes more bytes, forces a flush), the nested request sets a
//! flag instead of recursing; the outer capture loops exactly once more. The
//! last write therefore always produces a snapshot, with bounded work.
//!
//! # Callback failures
//!
//! A panicking callback is trapped and logged; it never propagates into the
//! producer's write path. After `dispose` no further callbacks are delivered,
//! including from an in-flight capture.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use scenecast_core::Snapshot;
use tracing::error;

use crate::capture::CaptureState;
use crate::emulator::Emulator;
use crate::scheduler::{DEFAULT_DEBOUNCE, DEFAULT_MAX_INTERVAL, FlushScheduler};

/// Change callback: the new snapshot and the previously emitted one.
pub type OnChange = Box<dyn FnMut(&Snapshot, Option<&Snapshot>)>;

/// Configuration for [`VirtualTerm`].
#[derive(Debug, Clone)]
pub struct VirtualTermOptions {
    pub cols: u16,
    pub rows: u16,
    pub scrollback: usize,
    pub debounce: Duration,
    pub max_interval: Duration,
}

impl Default for VirtualTermOptions {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            scrollback: 1000,
            debounce: DEFAULT_DEBOUNCE,
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }
}

/// Milliseconds since epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Emulator plus flush pacing plus change dedup.
pub struct VirtualTerm {
    emulator: Emulator,
    capture_state: CaptureState,
    scheduler: FlushScheduler,
    on_change: OnChange,
    last_snapshot: Option<Snapshot>,
    disposed: bool,
    capturing: bool,
    capture_needed: bool,
}

impl VirtualTerm {
    #[must_use]
    pub fn new(options: VirtualTermOptions, on_change: OnChange) -> Self {
        Self {
            emulator: Emulator::new(options.cols, options.rows, options.scrollback),
            capture_state: CaptureState::new(),
            scheduler: FlushScheduler::new(options.debounce, options.max_interval),
            on_change,
            last_snapshot: None,
            disposed: false,
            capturing: false,
            capture_needed: false,
        }
    }

    /// Feed bytes into the emulator and notify the scheduler. No-op after
    /// [`dispose`](Self::dispose).
    pub fn write(&mut self, bytes: &[u8]) {
        if self.disposed {
            return;
        }
        self.emulator.feed(bytes);
        self.scheduler.notify(Instant::now());
    }

    /// Change dimensions. Does not itself trigger a flush; the first
    /// post-resize snapshot reports `lines_offset = None`.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if self.disposed {
            return;
        }
        self.emulator.resize(cols, rows);
        self.capture_state.invalidate();
    }

    /// Synchronous capture, bypassing the scheduler and dedup.
    pub fn take_snapshot(&mut self) -> Snapshot {
        self.capture_state.capture(&self.emulator, now_ms())
    }

    /// Force immediate capture of all pending writes. Returns after the
    /// resulting change callback (if any) has run.
    pub fn flush(&mut self) {
        if self.disposed {
            return;
        }
        if self.scheduler.flush_pending() {
            self.capture();
        }
    }

    /// Run a capture if a scheduler deadline has passed. Drivers call this
    /// from their wait loop; [`next_deadline`](Self::next_deadline) says how
    /// long to sleep.
    pub fn pump(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        if self.scheduler.fire_due(now) {
            self.capture();
        }
    }

    /// When the driver should call [`pump`](Self::pump) next.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// The most recently emitted (post-dedup) snapshot.
    #[must_use]
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    /// Direct emulator access for polling-style consumers (record waits).
    #[must_use]
    pub fn emulator(&self) -> &Emulator {
        &self.emulator
    }

    /// Release all resources; further calls are no-ops.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.scheduler.dispose();
    }

    fn capture(&mut self) {
        if self.capturing {
            // Collapse: at most one extra capture after the current one.
            self.capture_needed = true;
            return;
        }
        self.capturing = true;
        loop {
            // Emitted snapshots are strictly monotonic in timestamp even when
            // captures land within the same millisecond.
            let timestamp = self
                .last_snapshot
                .as_ref()
                .map_or(0, |last| last.timestamp + 1)
                .max(now_ms());
            let snapshot = self.capture_state.capture(&self.emulator, timestamp);
            let changed = self
                .last_snapshot
                .as_ref()
                .is_none_or(|last| !last.same_content(&snapshot));
            if changed && !self.disposed {
                let previous = self.last_snapshot.take();
                let on_change = &mut self.on_change;
                let result = catch_unwind(AssertUnwindSafe(|| {
                    on_change(&snapshot, previous.as_ref());
                }));
                if result.is_err() {
                    error!("snapshot change callback panicked");
                }
                self.last_snapshot = Some(snapshot);
            }
            if self.capture_needed {
                self.capture_needed = false;
            } else {
                break;
            }
        }
        self.capturing = false;
    }
}
