use std::time::{Duration, Instant};

use rand::Rng;

/// Poll-style interval timer. `ringing` reports whether the deadline has
/// passed; `reset` re-arms it, applying jitter when configured.
pub struct Timer {
    base: Duration,
    jitter: Duration,
    deadline: Instant,
}

impl Timer {
    pub fn new(base: Duration) -> Self {
        Self::with_jitter(base, Duration::ZERO)
    }

    /// A timer whose interval varies by ±`jitter` on every reset.
    pub fn with_jitter(base: Duration, jitter: Duration) -> Self {
        let mut timer = Self {
            base,
            jitter,
            deadline: Instant::now(),
        };
        timer.reset();
        timer
    }

    pub fn reset(&mut self) {
        let mut interval = self.base;
        if !self.jitter.is_zero() {
            let jitter_millis = self.jitter.as_millis() as i64;
            let base_millis = self.base.as_millis() as i64;
            let offset = rand::thread_rng().gen_range(-jitter_millis..=jitter_millis);
            interval = Duration::from_millis((base_millis + offset).max(0) as u64);
        }
        self.deadline = Instant::now() + interval;
    }

    pub fn ringing(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Forces the next `ringing` check to fire.
    pub fn ring_now(&mut self) {
        self.deadline = Instant::now();
    }
}
