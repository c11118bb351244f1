//! # Frame Descriptors
//!
//! One immutable [`FrameDescriptor`] is created at the top of every loop
//! iteration and passed by value to the process, render and draw phases.

use std::time::{Duration, Instant};

/// Timing snapshot for a single loop iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameDescriptor {
    /// Iteration counter. Increments by one per iteration, regardless of wall time.
    pub clock_tick: u64,
    /// Monotonic seconds since the clock was created.
    pub wall_time: f32,
    /// Wall-clock seconds since the previous iteration.
    pub delta_time: f32,
}

/// Produces [`FrameDescriptor`]s.
///
/// Delta time is unbounded unless a maximum is configured: a long stall
/// yields one large delta and the physics accumulator catches up in
/// fixed sub-steps.
#[derive(Clone, Debug)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    next_tick: u64,
    max_delta: Option<Duration>,
}

impl FrameClock {
    /// Creates a clock starting now, with unbounded delta time.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a clock whose baseline is `start`.
    #[must_use]
    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            last: start,
            next_tick: 0,
            max_delta: None,
        }
    }

    /// Clamps every produced delta to at most `max_delta`.
    #[must_use]
    pub fn with_max_delta(mut self, max_delta: Option<Duration>) -> Self {
        self.max_delta = max_delta;
        self
    }

    /// Number of descriptors produced so far.
    #[inline]
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.next_tick
    }

    /// Advances the clock to the current instant.
    pub fn next_frame(&mut self) -> FrameDescriptor {
        self.advance_to(Instant::now())
    }

    /// Advances the clock to `now`.
    ///
    /// An instant earlier than the previous one produces a zero delta.
    pub fn advance_to(&mut self, now: Instant) -> FrameDescriptor {
        let mut delta = now.saturating_duration_since(self.last);
        if let Some(max) = self.max_delta {
            delta = delta.min(max);
        }
        if now > self.last {
            self.last = now;
        }

        let frame = FrameDescriptor {
            clock_tick: self.next_tick,
            wall_time: self.last.saturating_duration_since(self.start).as_secs_f32(),
            delta_time: delta.as_secs_f32(),
        };
        self.next_tick += 1;
        frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
