//! Logout through the in-game menu.

use super::capture_as;
use crate::context::FlowContext;
use crate::errors::FlowError;
use crate::stages::{Flow, Stage};
use crate::vision::Marker;
use tracing::info;

/// Builds the nine-stage logout flow.
///
/// Lobby, menu, menu popup, settings, settings popup, etc tab, logout,
/// confirm, and finally the terms screen that a logged out client shows.
#[must_use]
pub fn logout_flow() -> Flow {
    Flow::new("logout")
        .stage(
            Stage::new("verify_lobby")
                .verify("lobby visible", |ctx: FlowContext| async move {
                    ctx.wait_marker(Marker::GameStarted, ctx.config().timeouts.main_marker())
                        .await
                })
                .on_failure(capture_as("DEBUG_logout_lobby_not_found")),
        )
        .stage(
            Stage::new("tap_menu")
                .action(|ctx: FlowContext| async move {
                    tap_and_settle(&ctx, Marker::MenuButton, ctx.config().settle.after_menu_ms)
                        .await
                })
                .on_failure(capture_as("DEBUG_logout_menu_button_not_found")),
        )
        .stage(popup_stage(
            "verify_menu_popup",
            Marker::MenuPopup,
            "DEBUG_logout_menu_popup_not_found",
        ))
        .stage(
            Stage::new("tap_settings")
                .action(|ctx: FlowContext| async move {
                    tap_and_settle(
                        &ctx,
                        Marker::SettingsButton,
                        ctx.config().settle.after_settings_ms,
                    )
                    .await
                })
                .on_failure(capture_as("DEBUG_logout_settings_button_not_found")),
        )
        .stage(popup_stage(
            "verify_settings_popup",
            Marker::SettingsPopup,
            "DEBUG_logout_settings_popup_not_found",
        ))
        .stage(
            Stage::new("tap_etc")
                .action(|ctx: FlowContext| async move {
                    tap_and_settle(&ctx, Marker::EtcButton, ctx.config().settle.after_etc_ms).await
                })
                .on_failure(capture_as("DEBUG_logout_etc_button_not_found")),
        )
        .stage(
            Stage::new("tap_logout")
                .action(|ctx: FlowContext| async move {
                    tap_and_settle(
                        &ctx,
                        Marker::LogoutButton,
                        ctx.config().settle.after_logout_ms,
                    )
                    .await
                })
                .on_failure(capture_as("DEBUG_logout_logout_button_not_found")),
        )
        .stage(
            Stage::new("confirm_logout")
                .action(confirm_logout)
                .on_failure(capture_as("DEBUG_logout_logout_confirm_button_not_found")),
        )
        .stage(
            Stage::new("verify_logged_out")
                .verify("terms screen visible", |ctx: FlowContext| async move {
                    ctx.wait_marker(
                        Marker::TermsScreen,
                        ctx.config().timeouts.logout_verification(),
                    )
                    .await
                })
                .on_failure(capture_as("DEBUG_logout_logout_verification_failed")),
        )
}

fn popup_stage(name: &str, marker: Marker, evidence: &'static str) -> Stage {
    Stage::new(name)
        .verify(format!("{} visible", marker.stem()), move |ctx: FlowContext| async move {
            ctx.wait_marker(marker, ctx.config().timeouts.popup_transition())
                .await
        })
        .on_failure(capture_as(evidence))
}

async fn tap_and_settle(ctx: &FlowContext, marker: Marker, settle_ms: u64) -> Result<(), FlowError> {
    ctx.tap_marker(marker, ctx.config().timeouts.main_marker())
        .await?;
    ctx.settle(settle_ms).await
}

async fn confirm_logout(ctx: FlowContext) -> Result<(), FlowError> {
    // The confirmation popup is optional; only the button is required.
    let popup = ctx
        .wait_marker(
            Marker::LogoutConfirmPopup,
            ctx.config().timeouts.popup_transition(),
        )
        .await?;
    if !popup {
        info!("Logout confirmation popup not seen, looking for the button anyway");
    }
    tap_and_settle(
        &ctx,
        Marker::LogoutConfirmButton,
        ctx.config().settle.after_logout_confirm_ms,
    )
    .await
}
