//! Resilient HTTP wrapper shared by every source adapter: retry with
//! exponential backoff and jitter, `Retry-After` honoring, and a per-source
//! circuit breaker that trips after consecutive failures.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, Response};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::constants::{
    CIRCUIT_BREAKER_COOLDOWN, CIRCUIT_BREAKER_FAILURE_THRESHOLD, DEFAULT_BACKOFF_BASE,
    DEFAULT_BACKOFF_MAX, DEFAULT_MAX_RETRIES,
};
use crate::errors::{OracleError, OracleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: Mutex<BreakerState>,
    opened_at: Mutex<Option<Instant>>,
    consecutive_failures: AtomicU32,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed),
            opened_at: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    async fn before_request(&self, source: &str) -> OracleResult<()> {
        let mut state = self.state.lock().await;
        if *state == BreakerState::Open {
            let opened_at = self.opened_at.lock().await;
            if let Some(at) = *opened_at {
                if at.elapsed() >= CIRCUIT_BREAKER_COOLDOWN {
                    *state = BreakerState::HalfOpen;
                } else {
                    return Err(OracleError::Upstream {
                        source_name: source.to_string(),
                        message: "circuit breaker open".to_string(),
                        transient: true,
                    });
                }
            }
        }
        Ok(())
    }

    async fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.state.lock().await = BreakerState::Closed;
    }

    async fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= CIRCUIT_BREAKER_FAILURE_THRESHOLD {
            *self.state.lock().await = BreakerState::Open;
            *self.opened_at.lock().await = Some(Instant::now());
        }
    }
}

/// A `reqwest::Client` paired with a retry policy and circuit breaker, shared
/// across all adapters for a single source.
#[derive(Clone)]
pub struct ResilientHttpClient {
    client: Client,
    source_name: String,
    max_retries: u32,
    breaker: Arc<Breaker>,
}

impl ResilientHttpClient {
    pub fn new(source_name: impl Into<String>, timeout: Duration) -> OracleResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("neo-price-feed-core/0.1")
            .build()
            .map_err(|e| OracleError::Upstream {
                source_name: "http_client".to_string(),
                message: e.to_string(),
                transient: false,
            })?;

        Ok(Self {
            client,
            source_name: source_name.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            breaker: Arc::new(Breaker::new()),
        })
    }

    /// Issues a GET request, retrying transient failures with exponential
    /// backoff and jitter, honoring `Retry-After` on 429 responses.
    pub async fn get_with_retry(&self, url: &str) -> OracleResult<Response> {
        self.get_with_retry_headers(url, reqwest::header::HeaderMap::new())
            .await
    }

    /// Same as [`Self::get_with_retry`] but attaches extra headers to every
    /// attempt, for sources that authenticate via a header (CoinMarketCap).
    pub async fn get_with_retry_headers(
        &self,
        url: &str,
        headers: reqwest::header::HeaderMap,
    ) -> OracleResult<Response> {
        self.breaker.before_request(&self.source_name).await?;

        let mut attempt = 0;
        loop {
            let result = self.client.get(url).headers(headers.clone()).send().await;

            match result {
                Ok(response) if response.status().is_success() => {
                    self.breaker.record_success().await;
                    return Ok(response);
                }
                Ok(response) if response.status().as_u16() == 429 => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);

                    attempt += 1;
                    if attempt > self.max_retries {
                        self.breaker.record_failure().await;
                        return Err(OracleError::Upstream {
                            source_name: self.source_name.clone(),
                            message: "rate limited (429) after retries exhausted".to_string(),
                            transient: true,
                        });
                    }
                    tokio::time::sleep(retry_after.unwrap_or_else(|| self.backoff_delay(attempt)))
                        .await;
                }
                Ok(response) => {
                    let status = response.status();
                    attempt += 1;
                    if attempt > self.max_retries || status.is_client_error() {
                        self.breaker.record_failure().await;
                        return Err(OracleError::Upstream {
                            source_name: self.source_name.clone(),
                            message: format!("unexpected status {status}"),
                            transient: status.is_server_error(),
                        });
                    }
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        self.breaker.record_failure().await;
                        return Err(OracleError::Upstream {
                            source_name: self.source_name.clone(),
                            message: e.to_string(),
                            transient: true,
                        });
                    }
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = DEFAULT_BACKOFF_BASE.as_millis() as u64;
        let capped = base.saturating_mul(1u64 << attempt.min(8)).min(DEFAULT_BACKOFF_MAX.as_millis() as u64);
        let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
        Duration::from_millis(capped + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_grows_with_attempt_and_stays_capped() {
        let client = ResilientHttpClient::new("test", Duration::from_secs(1)).unwrap();
        let early = client.backoff_delay(1);
        let late = client.backoff_delay(10);
        assert!(late >= early);
        assert!(late <= DEFAULT_BACKOFF_MAX + Duration::from_millis(DEFAULT_BACKOFF_MAX.as_millis() as u64 / 4 + 1));
    }
}
