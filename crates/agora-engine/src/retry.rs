use agora_store::StoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 4;
const BASE_DELAY_MS: u64 = 100;

/// Run a store operation with bounded exponential backoff. Persistent
/// failure bubbles out; the caller's policy is to fail the tournament.
pub async fn with_store_retry<T, F, Fut>(label: &'static str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < MAX_ATTEMPTS && is_transient(&e) => {
                attempt += 1;
                let delay = Duration::from_millis(BASE_DELAY_MS << attempt);
                warn!(
                    op = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "🔁 store operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Domain violations (invalid transitions, uniqueness conflicts) never heal
/// by retrying; only backend/io faults do.
fn is_transient(e: &StoreError) -> bool {
    matches!(e, StoreError::Backend(_) | StoreError::Io(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_store_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Backend("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_domain_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_store_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::DuplicateEpoch(7)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_store_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Backend("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
