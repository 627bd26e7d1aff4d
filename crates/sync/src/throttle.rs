//! Emission throttling
//!
//! Bursts of local edits coalesce into the most recent value per window:
//! the first value in a quiet period goes out immediately, later ones
//! replace a single pending slot that is released once the window has
//! passed. Time comes from an injected [`Clock`] so tests never sleep.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use web_time::Instant;

/// Source of the current time
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock for tests; clones share the same time
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed_us: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_us: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let micros = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.elapsed_us.fetch_add(micros, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_micros(self.elapsed_us.load(Ordering::SeqCst))
    }
}

/// Outcome of offering a value to a [`Throttle`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Emission<T> {
    /// Send this now
    Emitted(T),
    /// Held as the pending value; released by [`Throttle::poll`]
    Coalesced,
}

/// Leading + trailing edge throttle
#[derive(Debug)]
pub struct Throttle<T, C = SystemClock> {
    window: Duration,
    clock: C,
    last_emit: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub const fn new(window: Duration) -> Self {
        Self::with_clock(window, SystemClock)
    }
}

impl<T, C: Clock> Throttle<T, C> {
    pub const fn with_clock(window: Duration, clock: C) -> Self {
        Self {
            window,
            clock,
            last_emit: None,
            pending: None,
        }
    }

    /// Offer a value; emits immediately if the window is open
    pub fn try_emit(&mut self, payload: T) -> Emission<T> {
        let now = self.clock.now();
        if self.window_open(now) {
            self.last_emit = Some(now);
            self.pending = None;
            Emission::Emitted(payload)
        } else {
            self.pending = Some(payload);
            Emission::Coalesced
        }
    }

    /// Release the pending value once its window has elapsed
    pub fn poll(&mut self) -> Option<T> {
        if self.pending.is_none() {
            return None;
        }
        let now = self.clock.now();
        if !self.window_open(now) {
            return None;
        }
        self.last_emit = Some(now);
        self.pending.take()
    }

    /// When the pending value becomes releasable
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        Some(self.last_emit? + self.window)
    }

    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending value but keep the current window
    pub fn cancel_pending(&mut self) -> Option<T> {
        self.pending.take()
    }

    /// Forget all state, as if freshly created
    pub fn reset(&mut self) {
        self.last_emit = None;
        self.pending = None;
    }

    fn window_open(&self, now: Instant) -> bool {
        self.last_emit
            .map_or(true, |last| now.duration_since(last) >= self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(ms: u64) -> (Throttle<&'static str, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (Throttle::with_clock(Duration::from_millis(ms), clock.clone()), clock)
    }

    #[test]
    fn first_value_goes_out_immediately() {
        let (mut t, _clock) = throttle(100);
        assert_eq!(t.try_emit("a"), Emission::Emitted("a"));
    }

    #[test]
    fn burst_coalesces_to_latest() {
        let (mut t, clock) = throttle(100);
        assert_eq!(t.try_emit("a"), Emission::Emitted("a"));
        assert_eq!(t.try_emit("b"), Emission::Coalesced);
        assert_eq!(t.try_emit("c"), Emission::Coalesced);
        assert_eq!(t.poll(), None);

        clock.advance(Duration::from_millis(100));
        assert_eq!(t.poll(), Some("c"));
        assert_eq!(t.poll(), None);
    }

    #[test]
    fn quiet_period_reopens_window() {
        let (mut t, clock) = throttle(50);
        let _ = t.try_emit("a");
        clock.advance(Duration::from_millis(60));
        assert_eq!(t.try_emit("b"), Emission::Emitted("b"));
    }

    #[test]
    fn trailing_flush_starts_a_new_window() {
        let (mut t, clock) = throttle(100);
        let _ = t.try_emit("a");
        let _ = t.try_emit("b");
        clock.advance(Duration::from_millis(100));
        assert_eq!(t.poll(), Some("b"));
        // "b" just went out, so "c" waits
        assert_eq!(t.try_emit("c"), Emission::Coalesced);
    }

    #[test]
    fn deadline_tracks_pending() {
        let (mut t, clock) = throttle(100);
        assert!(t.deadline().is_none());
        let _ = t.try_emit("a");
        assert!(t.deadline().is_none());
        let _ = t.try_emit("b");
        assert_eq!(t.deadline(), Some(clock.now() + Duration::from_millis(100)));
    }

    #[test]
    fn reset_discards_pending_and_window() {
        let (mut t, _clock) = throttle(100);
        let _ = t.try_emit("a");
        let _ = t.try_emit("b");
        t.reset();
        assert!(!t.has_pending());
        assert_eq!(t.try_emit("c"), Emission::Emitted("c"));
    }
}
