// Retry backoff and log rate limiting, owned per component instance.

use std::time::Duration;

use tokio::time::Instant;

/// Exponential backoff between failed attempts.
///
/// The delay after the n-th consecutive failure is
/// `min(base * factor^(n-1), max)`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    factor: f64,
    max: Duration,
    failures: u32,
    next_attempt: Option<Instant>,
}

impl Backoff {
    pub fn new(base: Duration, factor: f64, max: Duration) -> Self {
        Self {
            base,
            factor: factor.max(1.0),
            max,
            failures: 0,
            next_attempt: None,
        }
    }

    /// Whether an attempt is allowed at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.next_attempt.map_or(true, |at| now >= at)
    }

    /// Record a failure at `now` and return the delay before the next
    /// allowed attempt.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.current_delay();
        self.next_attempt = Some(now + delay);
        delay
    }

    pub fn reset(&mut self) {
        self.failures = 0;
        self.next_attempt = None;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn current_delay(&self) -> Duration {
        if self.failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (self.failures - 1).min(64) as i32;
        let secs = self.base.as_secs_f64() * self.factor.powi(exponent);
        let capped = secs.min(self.max.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

/// Allows one log line per `interval`.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` (and records `now`) if a line may be logged.
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcu_backoff() -> Backoff {
        Backoff::new(Duration::from_secs(2), 1.5, Duration::from_secs(15))
    }

    #[test]
    fn delay_grows_by_factor_and_caps() {
        let mut backoff = lcu_backoff();
        let now = Instant::now();
        let delays: Vec<f64> = (0..7)
            .map(|_| backoff.record_failure(now).as_secs_f64())
            .collect();

        let expected = [2.0, 3.0, 4.5, 6.75, 10.125, 15.0, 15.0];
        for (got, want) in delays.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
        }
    }

    #[test]
    fn ready_only_after_delay() {
        let mut backoff = lcu_backoff();
        let now = Instant::now();
        assert!(backoff.ready(now));

        backoff.record_failure(now);
        assert!(!backoff.ready(now + Duration::from_millis(1999)));
        assert!(backoff.ready(now + Duration::from_secs(2)));
    }

    #[test]
    fn reset_clears_failures() {
        let mut backoff = lcu_backoff();
        let now = Instant::now();
        backoff.record_failure(now);
        backoff.record_failure(now);
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert!(backoff.ready(now));
        assert_eq!(backoff.record_failure(now), Duration::from_secs(2));
    }

    #[test]
    fn log_throttle_allows_one_line_per_interval() {
        let mut throttle = LogThrottle::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(throttle.allow(t0));
        assert!(!throttle.allow(t0 + Duration::from_secs(10)));
        assert!(!throttle.allow(t0 + Duration::from_secs(29)));
        assert!(throttle.allow(t0 + Duration::from_secs(30)));
        assert!(!throttle.allow(t0 + Duration::from_secs(31)));
    }
}
