//! Per-connection flood control
//!
//! Token bucket: a client may send `burst` frames back to back, after which
//! frames are admitted at `refill` per second. Frames over the limit are
//! dropped by the caller, the connection stays open.

use mdcollab_sync::{Clock, SystemClock};
use web_time::Instant;

use crate::config::SyncConfig;

pub struct RateLimiter<C: Clock = SystemClock> {
    capacity: f64,
    per_sec: f64,
    available: f64,
    checked_at: Instant,
    clock: C,
}

impl RateLimiter {
    pub fn new(burst: f64, refill: f64) -> Self {
        Self::with_clock(burst, refill, SystemClock)
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.rate_burst, config.rate_refill)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(burst: f64, refill: f64, clock: C) -> Self {
        Self {
            capacity: burst,
            per_sec: refill,
            available: burst,
            checked_at: clock.now(),
            clock,
        }
    }

    /// Spend one token on an inbound frame; `false` means drop it
    pub fn try_consume(&mut self) -> bool {
        self.top_up();
        let admitted = self.available >= 1.0;
        if admitted {
            self.available -= 1.0;
        }
        admitted
    }

    /// Whole tokens left right now
    pub fn available(&mut self) -> u64 {
        self.top_up();
        self.available.max(0.0).floor() as u64
    }

    fn top_up(&mut self) {
        let now = self.clock.now();
        let gained = now.duration_since(self.checked_at).as_secs_f64() * self.per_sec;
        self.available = (self.available + gained).min(self.capacity);
        self.checked_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdcollab_sync::ManualClock;
    use std::time::Duration;

    fn limiter(burst: f64, refill: f64) -> (RateLimiter<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (RateLimiter::with_clock(burst, refill, clock.clone()), clock)
    }

    #[test]
    fn burst_then_drop() {
        let (mut limiter, _clock) = limiter(10.0, 1.0);
        assert_eq!((0..12).filter(|_| limiter.try_consume()).count(), 10);
    }

    #[test]
    fn tokens_come_back_over_time() {
        let (mut limiter, clock) = limiter(10.0, 10.0);
        while limiter.try_consume() {}

        // 200ms at 10/sec
        clock.advance(Duration::from_millis(200));
        assert_eq!(limiter.available(), 2);
        assert!(limiter.try_consume());
        assert!(limiter.try_consume());
        assert!(!limiter.try_consume());
    }

    #[test]
    fn idle_time_never_exceeds_burst() {
        let (mut limiter, clock) = limiter(3.0, 100.0);
        clock.advance(Duration::from_secs(60));
        assert_eq!(limiter.available(), 3);
    }

    #[test]
    fn configured_defaults_allow_a_large_burst() {
        let mut limiter = RateLimiter::from_config(&SyncConfig::default());
        assert!((0..1000).all(|_| limiter.try_consume()));
        assert!(!limiter.try_consume());
    }
}
