use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::ExecutionFailure;
use crate::rate_limit::RateLimiter;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Upper bound for a single attempt in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_timeout_ms() -> u64 {
    120_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Runs `op` until it succeeds or the policy is exhausted.
///
/// Each attempt is bounded by `timeout_ms`; an elapsed attempt counts as a
/// failure. Exhaustion is reported as [`ExecutionFailure::RetriesExhausted`]
/// wrapping the last error. See [`Retry`] for the other knobs.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    op: F,
) -> Result<T, ExecutionFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExecutionFailure>>,
{
    Retry::new(policy, operation).run(op).await
}

/// One retried call.
///
/// Failures that are not [transient](ExecutionFailure::is_transient) end the
/// call at once and are returned as they are. A rate-limited failure waits
/// at least as long as the service asked for.
pub struct Retry<'a> {
    policy: &'a RetryPolicy,
    operation: &'a str,
    limiter: Option<&'a RateLimiter>,
    bounded: bool,
}

impl<'a> Retry<'a> {
    pub fn new(policy: &'a RetryPolicy, operation: &'a str) -> Self {
        Self {
            policy,
            operation,
            limiter: None,
            bounded: true,
        }
    }

    /// Takes a permit from `limiter` before every attempt. Time spent
    /// waiting for it is not part of the attempt's timeout.
    pub fn rate_limited(mut self, limiter: &'a RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Lets every attempt run to completion. For calls that must not be
    /// abandoned half way, such as a non-idempotent POST.
    pub fn unbounded(mut self) -> Self {
        self.bounded = false;
        self
    }

    pub async fn run<T, F, Fut>(self, mut op: F) -> Result<T, ExecutionFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExecutionFailure>>,
    {
        let policy = self.policy;
        let operation = self.operation;
        let max_attempts = policy.max_attempts.max(1);
        let limit = Duration::from_millis(policy.timeout_ms);
        let mut attempt = 1;

        loop {
            if let Some(limiter) = self.limiter {
                limiter.acquire().await;
            }
            let outcome = if self.bounded {
                timeout(limit, op())
                    .await
                    .unwrap_or(Err(ExecutionFailure::Timeout(policy.timeout_ms)))
            } else {
                op().await
            };
            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                debug!(operation, attempt, error = %err, "Not retrying permanent failure");
                return Err(err);
            }
            if attempt >= max_attempts {
                return Err(ExecutionFailure::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay_ms = err
                .retry_after_ms()
                .map_or(policy.delay_ms, |after| after.max(policy.delay_ms));
            warn!(
                operation,
                attempt,
                max_attempts,
                delay_ms,
                error = %err,
                "Retrying after failure"
            );
            sleep(Duration::from_millis(delay_ms)).await;
            attempt += 1;
        }
    }
}
