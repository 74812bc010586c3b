//! First launch: clean install, permissions, asset download, terms.

use super::capture_as;
use crate::context::FlowContext;
use crate::errors::FlowError;
use crate::stages::{Flow, Stage};
use crate::transport::{with_implicit_wait, NativeSelector};
use crate::vision::Marker;
use crate::wait::DownloadCompletionDetector;
use std::path::PathBuf;
use tracing::{info, warn};

/// Builds the six-stage first launch flow.
///
/// 1. `clear_and_restart`: wipe app data and relaunch.
/// 2. `native_permissions`: allow the notification dialog if it shows.
/// 3. `initiate_download`: tap the resource download button.
/// 4. `download`: dwell, then poll for the completion marker.
/// 5. `proceed_to_terms`: tap the completion button.
/// 6. `terms_agreement`: accept all terms.
#[must_use]
pub fn first_launch_flow() -> Flow {
    Flow::new("first_launch")
        .stage(Stage::new("clear_and_restart").action(clear_and_restart))
        .stage(Stage::new("native_permissions").action(grant_notification_permission))
        .stage(
            Stage::new("initiate_download")
                .action(initiate_download)
                .on_failure(capture_as("DEBUG_download_button_not_found")),
        )
        // The detector captures its own completion and timeout screenshots.
        .stage(
            Stage::new("download")
                .action(wait_for_download)
                .on_failure(|_ctx, _info| async { None::<PathBuf> }),
        )
        .stage(Stage::new("proceed_to_terms").action(proceed_to_terms))
        .stage(
            Stage::new("terms_agreement")
                .action(accept_terms)
                .on_failure(capture_as("DEBUG_terms_agree_button_not_found")),
        )
}

async fn clear_and_restart(ctx: FlowContext) -> Result<(), FlowError> {
    let settle = &ctx.config().settle;
    ctx.session().clear_app_data(ctx.package()).await?;
    info!(package = %ctx.package(), "App data cleared");
    ctx.settle(settle.after_clear_ms).await?;

    ctx.session().activate_app(ctx.package()).await?;
    ctx.settle(settle.after_launch_ms).await
}

async fn grant_notification_permission(ctx: FlowContext) -> Result<(), FlowError> {
    let selector = NativeSelector::Id(ctx.config().selectors.permission_allow_id.clone());
    let session = ctx.session();
    let found = with_implicit_wait(session, ctx.config().timeouts.permission_popup(), || {
        session.find_native(&selector)
    })
    .await;

    match found {
        Ok(button) => {
            session.click_native(&button).await?;
            info!("Notification permission allowed");
            ctx.settle(ctx.config().settle.after_permission_ms).await
        }
        Err(err) if err.is_not_yet_ready() => {
            info!("No permission dialog, continuing");
            ctx.settle(ctx.config().settle.permission_absent_ms).await
        }
        Err(err) => Err(err),
    }
}

async fn initiate_download(ctx: FlowContext) -> Result<(), FlowError> {
    ctx.tap_marker(Marker::DownloadButton, ctx.config().timeouts.main_marker())
        .await?;
    info!("Resource download started");
    Ok(())
}

async fn wait_for_download(ctx: FlowContext) -> Result<(), FlowError> {
    let bounds = ctx.config().download.to_wait()?;
    let detector = DownloadCompletionDetector::new(bounds, ctx.cancel_token().clone());
    let report = detector
        .detect(
            ctx.matcher(),
            ctx.template(Marker::DownloadComplete)?,
            ctx.camera(),
        )
        .await?;

    if report.completed() {
        Ok(())
    } else {
        Err(FlowError::timeout(
            Marker::DownloadComplete.stem(),
            report.elapsed,
        ))
    }
}

async fn proceed_to_terms(ctx: FlowContext) -> Result<(), FlowError> {
    ctx.tap_marker(Marker::DownloadComplete, ctx.config().timeouts.main_marker())
        .await?;
    ctx.settle(ctx.config().settle.after_download_complete_ms)
        .await
}

async fn accept_terms(ctx: FlowContext) -> Result<(), FlowError> {
    let timeout = ctx.config().timeouts.main_marker();
    if ctx.wait_marker(Marker::TermsScreen, timeout).await? {
        ctx.settle(ctx.config().settle.after_terms_marker_ms).await?;
    } else {
        // The agree button is tried anyway.
        warn!("Terms screen marker not found");
        ctx.capture_evidence("DEBUG_terms_screen_not_found").await;
    }

    ctx.tap_marker(Marker::TermsAgreeAll, timeout).await?;
    info!("Terms accepted");
    ctx.settle(ctx.config().settle.after_terms_agree_ms).await
}
