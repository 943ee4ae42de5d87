//! Shared capture clock
//!
//! Every producer stamps its buffers against the same monotonic origin so the
//! tracks of one recording share a time base.

use std::time::{Duration, Instant};

/// Monotonic clock shared by all capture producers of an engine
#[derive(Debug, Clone, Copy)]
pub struct MediaClock {
    origin: Instant,
}

impl MediaClock {
    /// Create a clock whose zero point is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Microseconds elapsed since the clock origin
    pub fn now_us(&self) -> i64 {
        self.since_origin(Instant::now())
    }

    /// Convert an instant into the clock's time base
    pub fn since_origin(&self, instant: Instant) -> i64 {
        instant
            .checked_duration_since(self.origin)
            .unwrap_or(Duration::ZERO)
            .as_micros() as i64
    }
}

impl Default for MediaClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let clock = MediaClock::new();
        let first = clock.now_us();
        std::thread::sleep(Duration::from_millis(2));
        let second = clock.now_us();
        assert!(second > first);
    }

    #[test]
    fn test_instant_before_origin_clamps_to_zero() {
        let before = Instant::now();
        std::thread::sleep(Duration::from_millis(1));
        let clock = MediaClock::new();
        assert_eq!(clock.since_origin(before), 0);
    }
}
