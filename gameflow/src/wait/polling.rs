//! Bounded repeated-predicate evaluation.

use crate::cancellation::CancellationToken;
use crate::config::WaitSpec;
use crate::errors::FlowError;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Evaluates a probe until it succeeds or a [`WaitSpec`] runs out.
///
/// The first probe runs immediately. After a miss the waiter sleeps
/// `min(poll_interval, time left)` and probes again, so the last probe lands
/// on the deadline. Probe errors classified as not-yet-ready count as a
/// miss; any other error aborts the wait.
#[derive(Debug, Clone)]
pub struct PollingWaiter {
    cancel: Arc<CancellationToken>,
}

impl PollingWaiter {
    /// Creates a waiter observing `cancel`.
    #[must_use]
    pub fn new(cancel: Arc<CancellationToken>) -> Self {
        Self { cancel }
    }

    /// The token observed by every sleep.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Polls `probe` until it yields a value.
    ///
    /// Returns `Ok(None)` once the timeout has elapsed without a hit.
    pub async fn wait_for<T, F, Fut>(
        &self,
        what: &str,
        spec: WaitSpec,
        mut probe: F,
    ) -> Result<Option<T>, FlowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, FlowError>>,
    {
        let started = Instant::now();
        let deadline = started + spec.timeout();
        let mut attempts: u32 = 0;

        debug!(what = %what, timeout = ?spec.timeout(), interval = ?spec.poll_interval(), "Wait started");

        loop {
            self.cancel.check()?;
            attempts += 1;

            match probe().await {
                Ok(Some(value)) => {
                    debug!(what = %what, attempts, elapsed = ?started.elapsed(), "Wait satisfied");
                    return Ok(Some(value));
                }
                Ok(None) => trace!(what = %what, attempts, "Probe missed"),
                Err(err) if err.is_not_yet_ready() => {
                    trace!(what = %what, attempts, error = %err, "Probe not ready");
                }
                Err(err) => return Err(err),
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(what = %what, attempts, elapsed = ?started.elapsed(), "Wait timed out");
                return Ok(None);
            }
            self.cancel.sleep(spec.poll_interval().min(deadline - now)).await?;
        }
    }

    /// Polls a boolean predicate. Returns `Ok(false)` on timeout.
    pub async fn wait_until<F, Fut>(
        &self,
        what: &str,
        spec: WaitSpec,
        mut predicate: F,
    ) -> Result<bool, FlowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, FlowError>>,
    {
        let hit = self
            .wait_for(what, spec, || {
                let fut = predicate();
                async move { fut.await.map(|ok| ok.then_some(())) }
            })
            .await?;
        Ok(hit.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn waiter() -> PollingWaiter {
        PollingWaiter::new(Arc::new(CancellationToken::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_true_takes_no_time() {
        let start = Instant::now();
        let spec = WaitSpec::from_secs(30, 1).unwrap();
        let ok = waiter()
            .wait_until("ready", spec, || async { Ok(true) })
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_true_returns_at_timeout() {
        let start = Instant::now();
        let probes = AtomicU32::new(0);
        let spec = WaitSpec::from_secs(10, 3).unwrap();
        let ok = waiter()
            .wait_until("never", spec, || {
                probes.fetch_add(1, Ordering::SeqCst);
                async { Ok(false) }
            })
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        // 0, 3, 6, 9 and the final probe at 10
        assert_eq!(probes.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_becomes_true_on_later_tick() {
        let start = Instant::now();
        let spec = WaitSpec::from_secs(30, 2).unwrap();
        let value = waiter()
            .wait_for("value", spec, || async move {
                if start.elapsed() >= Duration::from_secs(5) {
                    Ok(Some(42))
                } else {
                    Ok(None)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, Some(42));
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_yet_ready_counts_as_miss() {
        let calls = AtomicU32::new(0);
        let spec = WaitSpec::from_secs(5, 1).unwrap();
        let ok = waiter()
            .wait_until("element", spec, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TransportError::NoSuchElement("image".into()).into())
                    } else {
                        Ok(true)
                    }
                }
            })
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_abort() {
        let start = Instant::now();
        let spec = WaitSpec::from_secs(30, 1).unwrap();
        let err = waiter()
            .wait_until("element", spec, || async {
                Err(TransportError::protocol("invalid session id", "gone").into())
            })
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_is_interrupted() {
        let cancel = Arc::new(CancellationToken::new());
        let waiter = PollingWaiter::new(cancel.clone());
        let spec = WaitSpec::from_secs(30, 1).unwrap();
        let calls = AtomicU32::new(0);
        let err = waiter
            .wait_until("cancel", spec, || {
                if calls.fetch_add(1, Ordering::SeqCst) == 2 {
                    cancel.cancel("stop");
                }
                async { Ok(false) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Interrupted(_)));
    }
}
