//! Wait policy: poll a condition until it holds or a deadline elapses
//!
//! Every observation of asynchronous state in the harness funnels through
//! this primitive. There are no fixed "sleep then check" pauses anywhere
//! else; a wait is always a deadline plus a poll interval.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crossflow_common::{Error, Result};

/// Deadline and poll interval for one wait. Stateless; construct one per
/// call site.
#[derive(Debug, Clone, Copy)]
pub struct WaitSpec {
    pub deadline: Duration,
    pub poll_interval: Duration,
}

impl WaitSpec {
    pub fn new(deadline: Duration, poll_interval: Duration) -> Self {
        Self { deadline, poll_interval }
    }
}

/// Poll `probe` until it returns `Ok(true)` or the deadline elapses.
///
/// Probe errors (transient lookup failures against an external surface)
/// count as "not yet satisfied", not as hard failures; only deadline
/// exhaustion terminates with `VerificationTimeout`. The timeout is never
/// reported before the deadline has actually elapsed. Between evaluations
/// the calling task suspends for the poll interval.
pub async fn wait_until<F, Fut>(spec: WaitSpec, what: &str, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    loop {
        match probe().await {
            Ok(true) => {
                trace!(what, elapsed_ms = start.elapsed().as_millis() as u64, "condition satisfied");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                debug!(what, "probe not yet satisfied: {e}");
            }
        }

        if start.elapsed() >= spec.deadline {
            return Err(Error::VerificationTimeout {
                what: what.to_string(),
                waited_ms: start.elapsed().as_millis() as u64,
            });
        }
        tokio::time::sleep(spec.poll_interval).await;
    }
}

/// Like [`wait_until`], for probes that yield a value once ready.
pub async fn wait_for_value<T, F, Fut>(spec: WaitSpec, what: &str, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    loop {
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => {
                debug!(what, "probe not yet satisfied: {e}");
            }
        }

        if start.elapsed() >= spec.deadline {
            return Err(Error::VerificationTimeout {
                what: what.to_string(),
                waited_ms: start.elapsed().as_millis() as u64,
            });
        }
        tokio::time::sleep(spec.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_once_condition_becomes_true() {
        let calls = AtomicU32::new(0);
        let spec = WaitSpec::new(Duration::from_millis(500), Duration::from_millis(5));

        wait_until(spec, "counter reaches three", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n >= 3) }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_at_or_after_deadline() {
        let spec = WaitSpec::new(Duration::from_millis(50), Duration::from_millis(10));
        let start = Instant::now();

        let err = wait_until(spec, "never", || async { Ok(false) })
            .await
            .unwrap_err();

        assert!(start.elapsed() >= Duration::from_millis(50));
        match err {
            Error::VerificationTimeout { what, waited_ms } => {
                assert_eq!(what, "never");
                assert!(waited_ms >= 50);
            }
            other => panic!("expected VerificationTimeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn probe_errors_are_not_terminal() {
        let calls = AtomicU32::new(0);
        let spec = WaitSpec::new(Duration::from_millis(500), Duration::from_millis(5));

        wait_until(spec, "flaky probe", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(Error::Transient("lookup refused".into()))
                } else {
                    Ok(true)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wait_for_value_returns_the_ready_value() {
        let calls = AtomicU32::new(0);
        let spec = WaitSpec::new(Duration::from_millis(500), Duration::from_millis(5));

        let value = wait_for_value(spec, "id assigned", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok((n >= 2).then_some(42i64)) }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
    }
}
