use std::future::Future;
use std::time::Duration;

use crate::error::InferenceError;

const MAX_DELAY_MS: u64 = 60_000;

/// Exponential backoff with ±25% jitter, capped at one minute.
///
/// A `Retry-After` hint from a 429 raises the delay when it is longer.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub(crate) fn backoff_delay_ms(
    backoff_base_ms: u64,
    attempt: u32,
    retry_after_secs: Option<u64>,
) -> u64 {
    let exp = backoff_base_ms.saturating_mul(1u64 << attempt.min(20));
    let capped = exp.min(MAX_DELAY_MS);
    let jitter = rand::random::<f64>() * 0.5 + 0.75;
    let jittered = ((capped as f64 * jitter) as u64).min(MAX_DELAY_MS);
    let hinted = retry_after_secs
        .unwrap_or(0)
        .saturating_mul(1000)
        .min(MAX_DELAY_MS);
    jittered.max(hinted)
}

/// Runs `operation`, retrying transient [`InferenceError`]s up to
/// `max_retries` additional times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, InferenceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, InferenceError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_transient() || attempt >= max_retries {
            return Err(err);
        }

        let retry_after_secs = match &err {
            InferenceError::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        };
        let delay_ms = backoff_delay_ms(backoff_base_ms, attempt, retry_after_secs);
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms,
            error = %err,
            "transient inference error, retrying"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn delay_stays_within_jitter_band() {
        for _ in 0..50 {
            let delay = backoff_delay_ms(1000, 1, None);
            assert!((1500..=2500).contains(&delay), "delay {delay} out of band");
        }
    }

    #[test]
    fn delay_is_capped() {
        assert!(backoff_delay_ms(50_000, 10, None) <= MAX_DELAY_MS);
        assert_eq!(backoff_delay_ms(0, 0, Some(3600)), MAX_DELAY_MS);
    }

    #[test]
    fn retry_after_hint_wins_when_longer() {
        assert_eq!(backoff_delay_ms(0, 0, Some(2)), 2000);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(InferenceError::Timeout { timeout_secs: 1 })
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = retry_with_backoff(3, 0, || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(InferenceError::HttpStatus {
                    status: 401,
                    body: "bad key".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = retry_with_backoff(2, 0, || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(InferenceError::Unreachable {
                    reason: "refused".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(InferenceError::Unreachable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
