//! Time sources for admission decisions.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Supplies the current monotonic time.
pub trait ClockSource: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// Wall-free monotonic clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl ClockSource for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Time is expressed as an offset from a fixed origin captured at
/// construction, which makes it suitable for tests and trace replay.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock positioned at its origin.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// The instant `offset` after the origin, without moving the clock.
    pub fn at(&self, offset: Duration) -> Instant {
        self.origin + offset
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock();
        *offset += by;
    }

    /// Position the clock at `offset` after the origin.
    pub fn set(&self, offset: Duration) {
        *self.offset.lock() = offset;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}
