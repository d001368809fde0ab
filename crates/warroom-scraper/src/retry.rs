//! Exponential backoff for transient fetch failures.
//!
//! Only errors for which [`FetchError::is_transient`] holds are retried;
//! everything else (4xx, malformed bodies, oversized bodies, bad URLs) is
//! returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Upper bound on how long a `Retry-After` header can stall one retry.
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// The wait before the n-th retry is `backoff_base_secs * 2^(n-1)` seconds,
/// or the server's `Retry-After` hint (capped) when that is longer. With
/// `max_retries = 2` the operation runs at most 3 times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
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

        let backoff_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
        let hinted_secs = match &err {
            FetchError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => (*secs).min(MAX_RETRY_AFTER_SECS),
            _ => 0,
        };
        let delay_secs = backoff_secs.max(hinted_secs);

        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn timeout() -> FetchError {
        FetchError::Timeout {
            url: "https://shop.test/products.json".to_owned(),
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, FetchError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_timeouts_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(timeout())
                } else {
                    Ok::<u32, FetchError>(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, FetchError>(FetchError::HttpStatus {
                    status: 503,
                    url: "https://shop.test".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(FetchError::HttpStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, FetchError>(FetchError::HttpStatus {
                    status: 404,
                    url: "https://shop.test".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn malformed_body_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let _ = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, FetchError>(FetchError::MalformedBody {
                    context: "test".to_owned(),
                    reason: "not json".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
