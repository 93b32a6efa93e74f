//! Leaky-bucket rate limiting for outbound traffic.
//!
//! Two buckets run off this type: the chat throttle in front of the
//! socket and the much slower WHOIS bucket inside the lookup tracker.
//! Time is passed in explicitly as monotonic seconds so the math stays
//! testable without a clock.

use std::time::Duration;

/// A leaky bucket over continuous time.
///
/// The level drains at `rate` units per second and each send adds
/// `increment`. While the level sits at or above `ceiling`, sends must
/// wait.
#[derive(Debug)]
pub struct LeakyBucket {
    rate: f64,
    ceiling: f64,
    increment: f64,
    level: f64,
    last: f64,
}

impl LeakyBucket {
    pub fn new(rate: f64, ceiling: f64, increment: f64) -> Self {
        Self {
            rate,
            ceiling,
            increment,
            level: 0.0,
            last: 0.0,
        }
    }

    fn drain(&mut self, now: f64) {
        let elapsed = now - self.last;
        if elapsed > 0.0 {
            self.level -= self.rate * elapsed;
            self.last = now;
        }
        // Idle periods must not bank unbounded credit.
        if self.level < 0.0 {
            self.level = 0.0;
        }
    }

    /// Try to pay for one send at monotonic time `now` (seconds).
    ///
    /// On success the cost has been added. On failure the returned
    /// duration is how long until a retry would succeed; the level is
    /// untouched so an interrupted wait costs nothing.
    pub fn try_acquire(&mut self, now: f64) -> Result<(), Duration> {
        self.drain(now);
        if self.level >= self.ceiling {
            let wait = (self.level + self.increment - self.ceiling) / self.rate;
            return Err(Duration::from_secs_f64(wait.max(0.001)));
        }
        self.level += self.increment;
        Ok(())
    }

    /// Drop any accumulated level, e.g. across reconnects.
    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> LeakyBucket {
        // rate 1/s, ceiling 3, cost 1: three immediate sends, then wait.
        LeakyBucket::new(1.0, 3.0, 1.0)
    }

    #[test]
    fn burst_up_to_ceiling_then_blocks() {
        let mut b = bucket();
        assert!(b.try_acquire(0.0).is_ok());
        assert!(b.try_acquire(0.0).is_ok());
        assert!(b.try_acquire(0.0).is_ok());
        let wait = b.try_acquire(0.0).unwrap_err();
        assert!(wait.as_secs_f64() > 0.9 && wait.as_secs_f64() < 1.1);
    }

    #[test]
    fn drains_over_time() {
        let mut b = bucket();
        for _ in 0..3 {
            b.try_acquire(0.0).unwrap();
        }
        // Half a second drains half a line of credit, which is room
        // enough for a fourth send.
        assert!(b.try_acquire(0.5).is_ok());
        // Level 3.5 now; blocked until it dips under the ceiling.
        assert!(b.try_acquire(0.6).is_err());
        assert!(b.try_acquire(1.6).is_ok());
    }

    #[test]
    fn long_idle_resets_to_zero_not_negative() {
        let mut b = bucket();
        b.try_acquire(0.0).unwrap();
        // After an hour the level is clamped to zero, so only a
        // ceiling's worth of burst is available, not an hour's worth.
        for _ in 0..3 {
            assert!(b.try_acquire(3600.0).is_ok());
        }
        assert!(b.try_acquire(3600.0).is_err());
    }

    #[test]
    fn failed_acquire_adds_no_cost() {
        let mut b = bucket();
        for _ in 0..3 {
            b.try_acquire(0.0).unwrap();
        }
        let w1 = b.try_acquire(0.0).unwrap_err();
        let w2 = b.try_acquire(0.0).unwrap_err();
        assert_eq!(w1, w2);
    }
}
