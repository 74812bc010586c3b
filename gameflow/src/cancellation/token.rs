//! Run interruption token.

use crate::errors::FlowError;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// Interrupts a run at its next wait.
///
/// The first reason given wins. Settle pauses, polling sleeps and the
/// download dwell all go through [`CancellationToken::sleep`], so an
/// interrupted run stops within one tick instead of finishing a long dwell.
#[derive(Default)]
pub struct CancellationToken {
    interrupted: AtomicBool,
    reason: RwLock<Option<String>>,
    wake: Notify,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupts the run. Later calls keep the first reason.
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        // The reason is stored before the flag so waiters never see a bare flag.
        let mut slot = self.reason.write();
        if self.interrupted.load(Ordering::SeqCst) {
            return;
        }
        info!(reason = %reason, "Run interruption requested");
        *slot = Some(reason);
        self.interrupted.store(true, Ordering::SeqCst);
        drop(slot);
        self.wake.notify_waiters();
    }

    /// Whether the run was interrupted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Why the run was interrupted.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Resolves once [`CancellationToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let woken = self.wake.notified();
            tokio::pin!(woken);
            woken.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            woken.await;
        }
    }

    /// [`FlowError::Interrupted`] if the run was interrupted.
    pub fn check(&self) -> Result<(), FlowError> {
        if self.is_cancelled() {
            Err(self.interrupted())
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration`, failing with [`FlowError::Interrupted`] as soon
    /// as the run is interrupted.
    pub async fn sleep(&self, duration: Duration) -> Result<(), FlowError> {
        self.check()?;
        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(()),
            () = self.cancelled() => Err(self.interrupted()),
        }
    }

    fn interrupted(&self) -> FlowError {
        FlowError::Interrupted(self.reason().unwrap_or_else(|| "run interrupted".to_string()))
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("interrupted", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fresh_token_passes_check() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_first_reason_wins() {
        let token = CancellationToken::new();
        token.cancel("interrupted by user");
        token.cancel("device lost");

        assert_eq!(token.reason().as_deref(), Some("interrupted by user"));
        let err = token.check().unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_runs_full_length() {
        let token = CancellationToken::new();
        let start = tokio::time::Instant::now();
        token.sleep(Duration::from_millis(1500)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dwell_interrupted_mid_way() {
        let token = Arc::new(CancellationToken::new());
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            canceller.cancel("ctrl-c");
        });

        let start = tokio::time::Instant::now();
        let err = token.sleep(Duration::from_secs(270)).await.unwrap_err();
        assert!(matches!(err, FlowError::Interrupted(ref reason) if reason == "ctrl-c"));
        assert_eq!(start.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_sleep_after_cancel_fails_immediately() {
        let token = CancellationToken::new();
        token.cancel("stop");
        assert!(token.sleep(Duration::from_secs(3600)).await.is_err());
    }
}
