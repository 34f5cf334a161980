//! Minimum-spacing rate limiter for the upstream quote provider

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Enforces a minimum interval between consecutive upstream requests.
///
/// One instance must be shared by every caller of the provider, otherwise
/// the provider quota is exceeded. Waiters are served in FIFO order.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter granting at most one request per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_grant: Mutex::new(None),
        }
    }

    /// Create a limiter from a requests-per-minute quota
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1);
        Self::new(Duration::from_secs(60) / requests)
    }

    /// Configured minimum interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may be sent, then record the grant.
    ///
    /// The lock is held across the wait so concurrent callers queue behind
    /// each other instead of all waking at the same instant. Returns the time
    /// spent waiting.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_grant.lock().await;

        let mut waited = Duration::ZERO;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                debug!(wait_ms = waited.as_millis() as u64, "Rate limit backpressure");
                sleep(waited).await;
            }
        }

        *last = Some(Instant::now());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_per_minute_quota() {
        assert_eq!(RateLimiter::per_minute(5).min_interval(), Duration::from_secs(12));
        assert_eq!(RateLimiter::per_minute(0).min_interval(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(12));
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_acquire_waits_remaining_interval() {
        let limiter = RateLimiter::new(Duration::from_secs(12));
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        let start = Instant::now();
        let waited = limiter.acquire().await;

        assert_eq!(waited, Duration::from_secs(7));
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_elapsed() {
        let limiter = RateLimiter::new(Duration::from_secs(12));
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_are_spaced() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(12)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }
        grants.sort();

        assert_eq!(grants[0], start);
        assert!(grants[1] - grants[0] >= Duration::from_secs(12));
        assert!(grants[2] - grants[1] >= Duration::from_secs(12));
    }
}
