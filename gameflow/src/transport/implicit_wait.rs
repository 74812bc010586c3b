//! Scoped implicit-wait override.

use super::DeviceSession;
use crate::errors::FlowError;
use std::future::Future;
use std::time::Duration;
use tracing::{trace, warn};

/// Runs `body` with the session's implicit wait set to `wait`.
///
/// The previous value is restored whether `body` succeeds or fails. When
/// both the body and the restore fail, the body's error is returned and the
/// restore failure is logged.
pub async fn with_implicit_wait<T, F, Fut>(
    session: &dyn DeviceSession,
    wait: Duration,
    body: F,
) -> Result<T, FlowError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, FlowError>>,
{
    let previous = session.implicit_wait().await?;
    if previous == wait {
        return body().await;
    }

    session.set_implicit_wait(wait).await?;
    trace!(?previous, ?wait, "Implicit wait overridden");

    let result = body().await;
    let restored = session.set_implicit_wait(previous).await;

    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(restore)) => Err(restore),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(restore)) => {
            warn!(error = %restore, "Failed to restore implicit wait");
            Err(err)
        }
    }
}
