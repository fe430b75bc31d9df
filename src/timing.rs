//! Timer primitives driven by an explicit clock.
//!
//! Nothing here sleeps or spawns. The owner feeds `Instant`s in from its event
//! loop, which keeps every timer deterministic under test.

use std::time::{Duration, Instant};

/// Trailing-edge debounce: fires once `delay` has elapsed since the last trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Record an event, pushing the deadline out.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Returns true exactly once per burst, when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// One-shot timer.
#[derive(Debug, Clone, Default)]
pub struct Timeout {
    deadline: Option<Instant>,
}

impl Timeout {
    pub fn start(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Coalesces bursts of events into one unit of work per animation frame.
///
/// Events overwrite the pending value; `request` reports whether a new frame
/// callback has to be scheduled, and the frame callback drains with `take`.
#[derive(Debug, Clone)]
pub struct FrameThrottle<T> {
    pending: Option<T>,
    frame_requested: bool,
}

impl<T> FrameThrottle<T> {
    pub fn new() -> Self {
        Self {
            pending: None,
            frame_requested: false,
        }
    }

    /// Store the latest value. Returns true if the caller must request a frame.
    pub fn request(&mut self, value: T) -> bool {
        self.pending = Some(value);
        if self.frame_requested {
            false
        } else {
            self.frame_requested = true;
            true
        }
    }

    /// Called from the frame callback. Yields the latest value, if any.
    pub fn take(&mut self) -> Option<T> {
        self.frame_requested = false;
        self.pending.take()
    }

    pub fn is_requested(&self) -> bool {
        self.frame_requested
    }

    pub fn cancel(&mut self) {
        self.frame_requested = false;
        self.pending = None;
    }
}

impl<T> Default for FrameThrottle<T> {
    fn default() -> Self {
        Self::new()
    }
}
