//! Process-wide token bucket rate limiter.

use std::sync::{Mutex, PoisonError};

use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// A token bucket with continuous refill.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        self.refill(capacity, refill_rate, Instant::now());

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Single shared bucket, built once at startup.
///
/// Bursts up to `burst_size` pass immediately; sustained throughput is bounded
/// by `requests_per_second`.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        let capacity = burst_size as f64;
        Self {
            bucket: Mutex::new(TokenBucket::full(capacity)),
            rate: requests_per_second as f64,
            capacity,
        }
    }

    /// `None` when rate limiting is disabled.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.requests_per_second, config.burst_size))
    }

    /// Consume one token if available.
    pub fn check(&self) -> bool {
        // The bucket holds plain numbers, so a poisoned lock is still consistent.
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_acquire(self.capacity, self.rate)
    }

    /// Tokens available right now, after refill.
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.refill(self.capacity, self.rate, Instant::now());
        bucket.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn burst_then_reject_then_refill_one() {
        let limiter = RateLimiter::new(5, 5);

        for i in 0..5 {
            assert!(limiter.check(), "request {i} within burst should pass");
        }
        assert!(!limiter.check(), "request past burst should be rejected");

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(limiter.check(), "one token refills after 1/rate seconds");
        assert!(!limiter.check(), "only one token refilled");
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_never_exceed_capacity() {
        let limiter = RateLimiter::new(10, 3);
        tokio::time::advance(Duration::from_secs(60)).await;

        assert_eq!(limiter.available(), 3.0);
        for _ in 0..3 {
            assert!(limiter.check());
        }
        assert!(!limiter.check());
    }

    #[tokio::test(start_paused = true)]
    async fn partial_refill_accumulates() {
        let limiter = RateLimiter::new(2, 1);
        assert!(limiter.check());

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(!limiter.check());
        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(limiter.check());
    }

    #[test]
    fn disabled_config_builds_nothing() {
        let config = RateLimitConfig {
            enabled: false,
            requests_per_second: 1,
            burst_size: 1,
        };
        assert!(RateLimiter::from_config(&config).is_none());
    }
}
