//! Token-bucket rate limiting for RPC egress.
//!
//! Public RPC endpoints throttle aggressively (HTTP 429), so every chain
//! call is funneled through one bucket per signer process. Tokens are
//! real-valued and refill continuously; waits happen outside the mutex so
//! a sleeping caller never blocks refills for others.

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Result};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{classify, ErrorKind};

/// Default bucket capacity (max burst size).
const DEFAULT_MAX_TOKENS: f64 = 5.0;
/// Default tokens added per refill interval.
const DEFAULT_REFILL_RATE: f64 = 1.0;
/// Default refill interval in seconds.
const DEFAULT_REFILL_INTERVAL: f64 = 1.0;
/// Default cap on how long an acquire may wait for tokens.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);
/// Default retry count for 429 responses inside [`RateLimiter::execute`].
const DEFAULT_RETRIES: u32 = 3;
/// Default exponential backoff factor between 429 retries.
const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with transparent retry-on-429 execution.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    max_tokens: f64,
    refill_rate: f64,
    refill_interval: f64,
    max_wait: Duration,
    retries: u32,
    backoff_factor: f64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS, DEFAULT_REFILL_RATE)
    }
}

impl RateLimiter {
    /// Create a bucket that starts full.
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
            max_tokens,
            refill_rate,
            refill_interval: DEFAULT_REFILL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            retries: DEFAULT_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }

    /// Override the maximum time an acquire may wait.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Override the 429 retry schedule used by [`execute`](Self::execute).
    pub fn with_retry(mut self, retries: u32, backoff_factor: f64) -> Self {
        self.retries = retries;
        self.backoff_factor = backoff_factor;
        self
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let refill_count = elapsed / self.refill_interval * self.refill_rate;
        if refill_count > 0.0 {
            state.tokens = self.max_tokens.min(state.tokens + refill_count);
            state.last_refill = now;
        }
    }

    /// Acquire `tokens` from the bucket, waiting up to the configured
    /// maximum. Returns false when the wait would exceed it.
    pub async fn acquire(&self, tokens: f64) -> bool {
        let wait = {
            let mut state = self.state.lock();
            self.refill(&mut state);

            if state.tokens >= tokens {
                state.tokens -= tokens;
                return true;
            }

            let wait_secs = (tokens - state.tokens) * self.refill_interval / self.refill_rate;
            if wait_secs > self.max_wait.as_secs_f64() {
                warn!(
                    wait_secs = format!("{wait_secs:.2}"),
                    max_wait_secs = self.max_wait.as_secs_f64(),
                    "Rate limit exceeded, refusing to wait"
                );
                return false;
            }
            Duration::from_secs_f64(wait_secs)
        };

        // Sleep outside the mutex so other callers can refill and drain.
        debug!(wait_ms = wait.as_millis() as u64, "Rate limit hit, waiting for tokens");
        tokio::time::sleep(wait).await;

        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= tokens {
            state.tokens -= tokens;
            true
        } else {
            false
        }
    }

    /// Run one RPC call under the bucket, retrying 429 responses with
    /// exponential backoff. Non-429 errors propagate on first occurrence.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 0..=self.retries {
            if !self.acquire(1.0).await {
                bail!("rate limit exceeded and maximum wait time reached ({label})");
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let message = format!("{e:#}");
                    if classify(&message) == ErrorKind::RateLimited && attempt < self.retries {
                        let wait_secs = self.backoff_factor.powi(attempt as i32);
                        warn!(
                            label,
                            attempt = attempt + 1,
                            retries = self.retries,
                            wait_secs,
                            "Rate limited (429), backing off before retry"
                        );
                        tokio::time::sleep(Duration::from_secs_f64(wait_secs)).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
        unreachable!("retry loop always returns")
    }

    /// Current token count (refilled to now). Exposed for diagnostics.
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_burst_up_to_capacity() {
        let limiter = RateLimiter::new(5.0, 1.0);
        for _ in 0..5 {
            assert!(limiter.acquire(1.0).await);
        }
        // Bucket is empty now; a zero-wait limiter refuses immediately.
        let strict = RateLimiter::new(5.0, 1.0).with_max_wait(Duration::from_secs(0));
        for _ in 0..5 {
            assert!(strict.acquire(1.0).await);
        }
        assert!(!strict.acquire(1.0).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_refill() {
        let limiter = RateLimiter::new(5.0, 1.0);
        for _ in 0..5 {
            assert!(limiter.acquire(1.0).await);
        }
        // Sixth acquire needs ~1s of refill; virtual time makes it instant.
        assert!(limiter.acquire(1.0).await);
    }

    #[tokio::test]
    async fn test_refuses_excessive_wait() {
        // 40 tokens at 1/s would need ~35s of refill: beyond the 30s cap.
        let limiter = RateLimiter::new(5.0, 1.0);
        assert!(!limiter.acquire(40.0).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_never_exceed_capacity() {
        let limiter = RateLimiter::new(5.0, 1.0);
        tokio::time::sleep(Duration::from_secs(120)).await;
        let tokens = limiter.available_tokens();
        assert!(tokens <= 5.0);
        assert!(tokens >= 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_retries_on_429() {
        let limiter = RateLimiter::new(5.0, 1.0);
        let calls = AtomicU32::new(0);

        let result: Result<u32> = limiter
            .execute("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        bail!("HTTP 429: Too Many Requests")
                    }
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_gives_up_after_retries() {
        let limiter = RateLimiter::new(5.0, 1.0).with_retry(2, 2.0);
        let calls = AtomicU32::new(0);

        let result: Result<u32> = limiter
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { bail!("HTTP 429: Too Many Requests") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_propagates_other_errors() {
        let limiter = RateLimiter::new(5.0, 1.0);
        let calls = AtomicU32::new(0);

        let result: Result<u32> = limiter
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { bail!("execution reverted: nope") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_fails_fast_when_bucket_exhausted() {
        let limiter = RateLimiter::new(1.0, 1.0).with_max_wait(Duration::from_secs(0));
        assert!(limiter.acquire(1.0).await);

        let result: Result<u32> = limiter.execute("test", || async move { Ok(1) }).await;
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("rate limit exceeded"));
    }
}
