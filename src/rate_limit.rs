use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Limits for calls into the generative services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Calls that may be made back to back before throttling starts.
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Sustained calls per minute. Zero disables limiting.
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
}

fn default_burst() -> u32 {
    5
}

fn default_per_minute() -> u32 {
    30
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: default_burst(),
            per_minute: default_per_minute(),
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Process-wide token bucket shared by every concurrently dispatching user.
///
/// Safe to call from any number of tasks. The lock is only held while the
/// bucket is updated, never while a caller waits. [`acquire`](Self::acquire)
/// reserves its permit up front, letting the balance go negative, so waiters
/// are served in arrival order and [`try_acquire`](Self::try_acquire) sees
/// the queue without blocking behind it.
pub struct RateLimiter {
    max_tokens: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let max_tokens = f64::from(config.burst.max(1));
        Self {
            max_tokens,
            refill_per_sec: f64::from(config.per_minute) / 60.0,
            bucket: Mutex::new(Bucket {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.refill_per_sec <= 0.0
    }

    /// Waits until a permit is available and consumes it.
    pub async fn acquire(&self) {
        if self.is_unlimited() {
            return;
        }
        let wait = {
            let mut bucket = self.bucket.lock().await;
            self.refill(&mut bucket);
            bucket.tokens -= 1.0;
            if bucket.tokens >= 0.0 {
                return;
            }
            Duration::from_secs_f64(-bucket.tokens / self.refill_per_sec)
        };
        debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
        sleep(wait).await;
    }

    /// Consumes a permit if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        if self.is_unlimited() {
            return true;
        }
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.max_tokens);
        bucket.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(burst: u32, per_minute: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig { burst, per_minute })
    }

    #[tokio::test]
    async fn allows_burst_then_blocks() {
        let limiter = limiter(2, 1);
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        // 600/min = one token every 100ms
        let limiter = limiter(1, 600);
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn zero_rate_is_unlimited() {
        let limiter = limiter(1, 0);
        assert!(limiter.is_unlimited());
        for _ in 0..100 {
            assert!(limiter.try_acquire().await);
            limiter.acquire().await;
        }
    }

    #[tokio::test]
    async fn concurrent_waiters_all_get_permits() {
        let limiter = Arc::new(limiter(2, 1200));
        let mut handles = Vec::new();
        for _ in 0..6 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move { l.acquire().await }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn try_acquire_does_not_wait_behind_a_sleeping_waiter() {
        // 30/min = one token every 2s
        let limiter = Arc::new(limiter(1, 30));
        limiter.acquire().await;

        let waiter = {
            let l = limiter.clone();
            tokio::spawn(async move { l.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let start = Instant::now();
        assert!(!limiter.try_acquire().await);
        assert!(start.elapsed() < Duration::from_millis(100));
        waiter.abort();
    }

    #[tokio::test]
    async fn waiters_are_spaced_by_the_refill_rate() {
        // 1200/min = one token every 50ms
        let limiter = Arc::new(limiter(1, 1200));
        limiter.acquire().await;
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let l = limiter.clone();
            handles.push(tokio::spawn(async move { l.acquire().await }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(130));
    }

    #[test]
    fn default_config_values() {
        let config = RateLimitConfig::default();
        assert_eq!(config.burst, 5);
        assert_eq!(config.per_minute, 30);
    }
}
