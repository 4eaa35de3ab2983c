//! Sliding window request counter.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tracks admitted request timestamps for one identity within a trailing window.
///
/// Events are kept in arrival order, so eviction only ever inspects the front
/// of the queue. Unlike a fixed-bucket counter, the count is exact for any
/// window ending at `now`.
#[derive(Debug, Clone)]
pub struct WindowCounter {
    /// Length of the trailing window
    window: Duration,
    /// Admitted event timestamps, oldest first
    events: VecDeque<Instant>,
}

impl WindowCounter {
    /// Create an empty counter for the given window length.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            events: VecDeque::new(),
        }
    }

    /// The configured window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Drop every event older than `now - window`.
    ///
    /// An event exactly `window` old is still inside the window.
    pub fn purge(&mut self, now: Instant) {
        while let Some(front) = self.events.front() {
            if now.saturating_duration_since(*front) > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Purge expired events, provisionally record `now`, and return the count.
    ///
    /// The caller must call [`WindowCounter::rollback`] if it decides not to
    /// keep the provisional event.
    pub fn record_and_count(&mut self, now: Instant) -> usize {
        self.purge(now);
        self.events.push_back(now);
        self.events.len()
    }

    /// Events inside the window ending at `now`, without purging.
    pub fn count_at(&self, now: Instant) -> usize {
        let expired = self
            .events
            .partition_point(|t| now.saturating_duration_since(*t) > self.window);
        self.events.len() - expired
    }

    /// Remove the most recently recorded event.
    pub fn rollback(&mut self) {
        self.events.pop_back();
    }

    /// Number of events currently held, including any not yet purged.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the counter holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
