//! Interval Throttle
//!
//! Lets peak tracking through at most once per `peak_update_interval_ms`,
//! backed by a single-cell `governor` quota.

use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectLimiter<C> = RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Rate limiter for peak updates.
///
/// The first call always passes. A zero interval passes every call.
pub struct IntervalThrottle<C: Clock = DefaultClock> {
    interval: Duration,
    limiter: Option<DirectLimiter<C>>,
}

impl IntervalThrottle {
    /// Throttle on the default monotonic clock.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, &DefaultClock::default())
    }

    /// Build from a millisecond interval.
    #[must_use]
    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }
}

impl<C: Clock> IntervalThrottle<C> {
    /// Throttle measured on `clock`.
    #[must_use]
    pub fn with_clock(interval: Duration, clock: &C) -> Self {
        // `with_period` is None for a zero interval, which disables throttling.
        let limiter = Quota::with_period(interval).map(|quota| RateLimiter::direct_with_clock(quota, clock));
        Self { interval, limiter }
    }

    /// Configured interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the operation may run now; consumes the interval's cell if so.
    pub fn try_acquire(&self) -> bool {
        self.limiter
            .as_ref()
            .is_none_or(|limiter| limiter.check().is_ok())
    }
}

impl<C: Clock> std::fmt::Debug for IntervalThrottle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalThrottle")
            .field("interval", &self.interval)
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}
