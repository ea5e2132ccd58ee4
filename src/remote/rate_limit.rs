//! Rate limiting for catalog requests

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use tracing::trace;

/// Limits requests across every concurrent playlist fetch
pub struct RequestRateLimiter {
    limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl RequestRateLimiter {
    /// Create a new limiter allowing `requests_per_second` (at least 1)
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        let quota = Quota::per_second(rps);
        let limiter = RateLimiter::direct(quota);

        Self { limiter }
    }

    /// Wait until a request is allowed
    pub async fn wait(&self) {
        if self.limiter.check().is_err() {
            trace!("Rate limiting catalog request");
            self.limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_burst_within_quota() {
        let limiter = RequestRateLimiter::new(100);

        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_throttles_past_quota() {
        let limiter = RequestRateLimiter::new(2);

        let start = Instant::now();
        for _ in 0..4 {
            limiter.wait().await;
        }
        // Burst of 2, then two more at 500ms spacing
        assert!(start.elapsed() >= Duration::from_millis(800));
    }
}
