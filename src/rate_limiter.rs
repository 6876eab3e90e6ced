//! Per-source token-bucket rate limiting with cooperative FIFO blocking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::errors::{OracleError, OracleResult};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub tokens_per_interval: u32,
    pub interval: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            tokens_per_interval: crate::constants::DEFAULT_RATE_LIMIT_TOKENS,
            interval: crate::constants::DEFAULT_RATE_LIMIT_INTERVAL,
        }
    }
}

struct Bucket {
    policy: RateLimitPolicy,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(policy: RateLimitPolicy) -> Self {
        Self {
            tokens: policy.tokens_per_interval as f64,
            policy,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let rate = self.policy.tokens_per_interval as f64 / self.policy.interval.as_secs_f64();
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate)
            .min(self.policy.tokens_per_interval as f64);
        self.last_refill = now;
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_next_token(&self) -> Duration {
        let rate = self.policy.tokens_per_interval as f64 / self.policy.interval.as_secs_f64();
        let deficit = 1.0 - self.tokens;
        Duration::from_secs_f64((deficit / rate).max(0.0))
    }
}

/// One bucket per source name, shared across adapters and their concurrent
/// requests. Callers await `acquire` before issuing an HTTP request.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
    wait_timeout: Duration,
}

impl RateLimiter {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            wait_timeout,
        }
    }

    /// Blocks until a token is available for `source`, or returns a transient
    /// `Upstream` error once `wait_timeout` has elapsed without one.
    pub async fn acquire(&self, source: &str, policy: RateLimitPolicy) -> OracleResult<()> {
        let deadline = Instant::now() + self.wait_timeout;

        loop {
            let wait = {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(source.to_string())
                    .or_insert_with(|| Bucket::new(policy));

                if bucket.try_take() {
                    return Ok(());
                }
                bucket.time_until_next_token()
            };

            if Instant::now() + wait > deadline {
                return Err(OracleError::Upstream {
                    source_name: source.to_string(),
                    message: "rate limiter wait timeout exceeded".to_string(),
                    transient: true,
                });
            }

            tokio::time::sleep(wait.min(Duration::from_millis(50))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_succeeds_while_tokens_remain() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let policy = RateLimitPolicy {
            tokens_per_interval: 2,
            interval: Duration::from_secs(1),
        };

        limiter.acquire("binance", policy).await.unwrap();
        limiter.acquire("binance", policy).await.unwrap();
    }

    #[tokio::test]
    async fn acquire_blocks_then_succeeds_after_refill() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        let policy = RateLimitPolicy {
            tokens_per_interval: 1,
            interval: Duration::from_millis(100),
        };

        limiter.acquire("coinbase", policy).await.unwrap();
        limiter.acquire("coinbase", policy).await.unwrap();
    }

    #[tokio::test]
    async fn acquire_times_out_when_exhausted_and_timeout_too_short() {
        let limiter = RateLimiter::new(Duration::from_millis(10));
        let policy = RateLimitPolicy {
            tokens_per_interval: 1,
            interval: Duration::from_secs(10),
        };

        limiter.acquire("okex", policy).await.unwrap();
        let result = limiter.acquire("okex", policy).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn separate_sources_have_independent_buckets() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let policy = RateLimitPolicy {
            tokens_per_interval: 1,
            interval: Duration::from_secs(10),
        };

        limiter.acquire("binance", policy).await.unwrap();
        limiter.acquire("coinbase", policy).await.unwrap();
    }
}
