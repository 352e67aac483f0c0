//! Table-driven retry policy over the error taxonomy.
//!
//! The pipeline never retries on its own; the façade decides here. Only
//! three classes of rejection are worth another attempt: nonce races
//! (after the serializer has adopted the chain's view), RPC throttling,
//! and transport blips. A `RateLimited` caused by the local token bucket
//! refusing to wait is surfaced immediately; backing off and retrying
//! would defeat the backpressure.

use std::time::Duration;

use rewarder_chain::{ContractCall, ErrorKind, SubmissionPipeline, SubmissionResult};
use tracing::info;

/// Why a rejected submission is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// `NonceTooLow`: the serializer has reset; a new nonce will be used.
    NonceReset,
    /// HTTP 429 from the node.
    RateLimit,
    /// Transport-layer timeout or connection failure.
    Transport,
}

/// Marker the rate limiter puts into acquire-exhaustion errors.
const ACQUIRE_EXHAUSTED: &str = "maximum wait time reached";

/// Decide whether a rejection is retryable, and how.
pub fn retry_class(kind: ErrorKind, error: &str) -> Option<RetryClass> {
    match kind {
        ErrorKind::NonceTooLow => Some(RetryClass::NonceReset),
        ErrorKind::RateLimited => {
            if error.contains(ACQUIRE_EXHAUSTED) {
                // Local backpressure: the caller retries, not us.
                None
            } else {
                Some(RetryClass::RateLimit)
            }
        }
        ErrorKind::NetworkTimeout | ErrorKind::ConnectionError => Some(RetryClass::Transport),
        _ => None,
    }
}

/// Backoff before retry `attempt` (0-based): nonce and transport errors
/// wait `0.5 * 2^n` seconds, throttling waits `2 * 2^n`.
pub fn backoff_delay(class: RetryClass, attempt: u32) -> Duration {
    let base = match class {
        RetryClass::RateLimit => 2.0,
        RetryClass::NonceReset | RetryClass::Transport => 0.5,
    };
    Duration::from_secs_f64(base * 2f64.powi(attempt as i32))
}

/// Submit a call, retrying retryable rejections up to `max_retries`
/// times. Returns the final result and the number of retries consumed.
pub async fn submit_with_retry(
    pipeline: &SubmissionPipeline,
    call: ContractCall,
    max_retries: u32,
) -> (SubmissionResult, u32) {
    let mut attempt = 0;
    loop {
        let result = pipeline.submit(call.clone()).await;

        let (kind, error) = match &result {
            SubmissionResult::Rejected { kind, error } => (*kind, error.as_str()),
            SubmissionResult::Submitted { .. } => return (result, attempt),
        };

        let Some(class) = retry_class(kind, error) else {
            return (result, attempt);
        };
        if attempt >= max_retries {
            return (result, attempt);
        }

        let delay = backoff_delay(class, attempt);
        info!(
            function = call.function,
            kind = kind.as_str(),
            attempt = attempt + 1,
            max_retries,
            delay_ms = delay.as_millis() as u64,
            "Retrying rejected submission"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_table() {
        assert_eq!(
            retry_class(ErrorKind::NonceTooLow, "nonce too low"),
            Some(RetryClass::NonceReset)
        );
        assert_eq!(
            retry_class(ErrorKind::RateLimited, "HTTP 429"),
            Some(RetryClass::RateLimit)
        );
        assert_eq!(
            retry_class(ErrorKind::NetworkTimeout, "timed out"),
            Some(RetryClass::Transport)
        );
        assert_eq!(
            retry_class(ErrorKind::ConnectionError, "connection refused"),
            Some(RetryClass::Transport)
        );

        for kind in [
            ErrorKind::UnderpricedReplacement,
            ErrorKind::InsufficientFunds,
            ErrorKind::GasLimitExceeded,
            ErrorKind::ContractRevert,
            ErrorKind::OutOfGasOrRevert,
            ErrorKind::PermissionError,
            ErrorKind::ValidationError,
            ErrorKind::UnexpectedError,
        ] {
            assert_eq!(retry_class(kind, ""), None);
        }
    }

    #[test]
    fn test_local_backpressure_is_not_retried() {
        assert_eq!(
            retry_class(
                ErrorKind::RateLimited,
                "rate limit exceeded and maximum wait time reached (send_raw_transaction)"
            ),
            None
        );
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_delay(RetryClass::NonceReset, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(RetryClass::NonceReset, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(RetryClass::NonceReset, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(RetryClass::RateLimit, 0), Duration::from_secs(2));
        assert_eq!(backoff_delay(RetryClass::RateLimit, 2), Duration::from_secs(8));
    }
}
