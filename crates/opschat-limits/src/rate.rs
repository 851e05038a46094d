//! Token-bucket admission control for tool invocations.

use std::sync::Mutex;
use std::time::Instant;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Non-blocking token bucket: `burst` capacity, refilled continuously at
/// `per_second`. A limiter built with a non-positive rate or burst is
/// disabled and admits everything.
pub struct RateLimiter {
    bucket: Option<Mutex<Bucket>>,
    per_second: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(per_second: f64, burst: i64) -> Self {
        if per_second <= 0.0 || burst <= 0 {
            return Self::disabled();
        }

        let burst = burst as f64;
        Self {
            bucket: Some(Mutex::new(Bucket {
                // The bucket starts full so a fresh limiter admits a burst.
                tokens: burst,
                last_refill: Instant::now(),
            })),
            per_second,
            burst,
        }
    }

    pub fn disabled() -> Self {
        Self {
            bucket: None,
            per_second: 0.0,
            burst: 0.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bucket.is_some()
    }

    /// Takes one token if available. Never blocks.
    pub fn allow(&self) -> bool {
        let Some(bucket) = &self.bucket else {
            return true;
        };

        let mut state = bucket.lock().unwrap();

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.per_second).min(self.burst);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_burst_is_admitted_then_denied() {
        let limiter = RateLimiter::new(1.0, 3);

        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn test_tokens_refill_over_time() {
        let limiter = RateLimiter::new(100.0, 1);

        assert!(limiter.allow());
        assert!(!limiter.allow());

        // 100 tokens/s means well under 50ms to earn one back.
        std::thread::sleep(Duration::from_millis(50));
        assert!(limiter.allow());
    }

    #[test]
    fn test_refill_never_exceeds_burst() {
        let limiter = RateLimiter::new(50.0, 2);

        assert!(limiter.allow());
        // 100ms at 50/s would earn 5 tokens uncapped; the bucket stays at 2.
        std::thread::sleep(Duration::from_millis(100));

        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn test_non_positive_rate_disables() {
        let limiter = RateLimiter::new(0.0, 10);
        assert!(!limiter.is_enabled());
        for _ in 0..100 {
            assert!(limiter.allow());
        }
    }

    #[test]
    fn test_non_positive_burst_disables() {
        let limiter = RateLimiter::new(5.0, 0);
        assert!(!limiter.is_enabled());
        assert!(limiter.allow());

        let limiter = RateLimiter::new(5.0, -1);
        assert!(limiter.allow());
    }

    #[test]
    fn test_disabled_constructor() {
        let limiter = RateLimiter::disabled();
        assert!(!limiter.is_enabled());
        assert!(limiter.allow());
    }
}
