//! Backoff helper for transient failures
//!
//! Transient bus/store errors are retried with capped exponential backoff
//! and jitter. Anything else propagates immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::Result;

/// Initial delay between retries.
const BASE_DELAY: Duration = Duration::from_millis(100);

/// Cap on the backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Retry `op` up to `max_attempts` times on transient errors.
///
/// Non-transient errors are returned on first occurrence.
pub async fn with_backoff<T, F, Fut>(label: &str, max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = BASE_DELAY;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                warn!(%label, attempt, error = %err, "transient failure, backing off");
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..50));
                tokio::time::sleep(delay + jitter).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenosError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("test", 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(GenosError::TransientIo("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_fails_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff("test", 5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GenosError::PolicyViolation("no".into())) }
        })
        .await;
        assert!(matches!(result, Err(GenosError::PolicyViolation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_error() {
        let result: Result<()> = with_backoff("test", 2, || async {
            Err(GenosError::TransientIo("still down".into()))
        })
        .await;
        assert!(matches!(result, Err(GenosError::TransientIo(_))));
    }
}
