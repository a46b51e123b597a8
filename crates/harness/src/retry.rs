//! Retry policy: bounded re-attempts with a fixed inter-attempt delay
//!
//! Only retry-eligible errors (see `Error::is_retryable`) are re-attempted;
//! denials, security violations, and exhausted waits propagate immediately.
//! Operations with non-idempotent side effects must carry their own
//! uniqueness guard before being passed here (the orchestrator's create
//! closure looks the project up by name first).

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crossflow_common::{Error, Result};

/// Attempt bound and inter-attempt delay. Stateless.
#[derive(Debug, Clone, Copy)]
pub struct RetrySpec {
    /// Total invocations allowed, including the first. Must be >= 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetrySpec {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }
}

/// Invoke `op` up to `spec.max_attempts` times. The final failure is
/// wrapped in `RetriesExhausted` carrying the attempt count and the last
/// error; a first-attempt non-retryable failure propagates unwrapped.
pub async fn with_retry<T, F, Fut>(spec: RetrySpec, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < spec.max_attempts => {
                warn!(
                    "{operation}: attempt {attempt}/{} failed: {e}",
                    spec.max_attempts
                );
                tokio::time::sleep(spec.delay).await;
            }
            Err(e) if attempt > 1 => {
                return Err(Error::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetrySpec {
        RetrySpec::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_after_k_failures_in_exactly_k_plus_one_calls() {
        let calls = AtomicU32::new(0);

        let value = with_retry(quick(5), "flaky op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n <= 2 {
                    Err(Error::Transient("connection refused".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_exceeds_max_attempts() {
        let calls = AtomicU32::new(0);

        let err = with_retry(quick(3), "always fails", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Transient("timeout".into())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            Error::RetriesExhausted { attempts, operation, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(operation, "always fails");
            }
            other => panic!("expected RetriesExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_errors_propagate_immediately() {
        let calls = AtomicU32::new(0);

        let err = with_retry(quick(5), "forbidden op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(Error::Forbidden {
                    tenant: crossflow_common::types::TenantId::from("company2"),
                })
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, Error::Forbidden { .. }));
    }

    #[tokio::test]
    async fn single_attempt_spec_invokes_once() {
        let calls = AtomicU32::new(0);

        let _ = with_retry(quick(1), "one shot", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Transient("timeout".into())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
