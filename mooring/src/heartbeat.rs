//! Keep-alive liveness counters.
//!
//! [`HeartbeatTracker`] is deliberately inert: it owns no timer and performs
//! no I/O. The owning channel advances it from the tick loop, decides when an
//! interval has passed silent, and reads the miss count back out for policy
//! (probe, notify, close). Keeping the counters pure makes liveness logic
//! testable without a connection.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mooring::HeartbeatTracker;
//!
//! let mut tracker = HeartbeatTracker::new();
//! tracker.advance(Duration::from_secs(31));
//! assert_eq!(tracker.record_miss(), 0);
//!
//! // A beat arrives: full revival.
//! tracker.reset(true);
//! assert_eq!(tracker.missed(), 0);
//! assert_eq!(tracker.elapsed(), Duration::ZERO);
//! ```

use std::time::Duration;

/// Elapsed-and-missed counters for one connection's keep-alive exchange.
#[derive(Debug, Default)]
pub struct HeartbeatTracker {
    elapsed: Duration,
    missed: u32,
}

impl HeartbeatTracker {
    /// Creates a tracker with both counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Time accumulated since the last beat or interval restart.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Consecutive intervals that passed without a beat.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Advances the elapsed counter and returns the new value.
    pub fn advance(&mut self, dt: Duration) -> Duration {
        self.elapsed = self.elapsed.saturating_add(dt);
        self.elapsed
    }

    /// Records one interval passed without a beat: restarts the elapsed
    /// cycle, increments the missed count, and returns the count as it stood
    /// before the increment (the value a miss notification carries).
    pub fn record_miss(&mut self) -> u32 {
        let missed_before = self.missed;
        self.elapsed = Duration::ZERO;
        self.missed = self.missed.saturating_add(1);
        missed_before
    }

    /// Revives the tracker. Always zeroes the missed count; zeroes elapsed
    /// only when `reset_elapsed` is true. Pass true on keep-alive receipt,
    /// false to suppress an imminent miss without discarding timing.
    pub fn reset(&mut self, reset_elapsed: bool) {
        if reset_elapsed {
            self.elapsed = Duration::ZERO;
        }
        self.missed = 0;
    }
}
