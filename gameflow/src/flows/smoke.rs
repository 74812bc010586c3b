//! Smoke checks TC01 to TC04.
//!
//! Each case is its own single-stage flow so that a failing case does not
//! keep the later ones from being recorded. A case whose prerequisite is
//! missing blocks instead of failing.

use super::start_app;
use crate::context::FlowContext;
use crate::errors::FlowError;
use crate::stages::{Flow, Stage};
use crate::vision::Marker;
use tracing::info;

/// One numbered smoke case.
#[derive(Debug, Clone)]
pub struct SmokeCase {
    /// Test case number, also the spreadsheet row index.
    pub index: u32,
    /// Single-stage flow named after the case.
    pub flow: Flow,
}

/// Builds TC01 `StartApp`, TC02 `MainLogo`, TC03 `CheekDragStart` and
/// TC04 `GameExit`.
#[must_use]
pub fn smoke_suite() -> Vec<SmokeCase> {
    vec![
        SmokeCase {
            index: 1,
            flow: case(start_app_stage()),
        },
        SmokeCase {
            index: 2,
            flow: case(main_logo_stage()),
        },
        SmokeCase {
            index: 3,
            flow: case(cheek_drag_stage()),
        },
        SmokeCase {
            index: 4,
            flow: case(game_exit_stage()),
        },
    ]
}

fn case(stage: Stage) -> Flow {
    Flow::new("smoke").stage(stage)
}

fn start_app_stage() -> Stage {
    Stage::new("StartApp")
        .action(|ctx: FlowContext| async move {
            ctx.session().activate_app(ctx.package()).await
        })
        .verify("foreground package reported", |ctx: FlowContext| async move {
            let package = ctx.session().current_package().await?;
            info!(package = ?package, "Current package");
            Ok(package.is_some_and(|p| !p.is_empty()))
        })
}

fn main_logo_stage() -> Stage {
    Stage::new("MainLogo")
        .precondition("app started", |ctx: FlowContext| async move {
            start_app(&ctx).await
        })
        .verify("main marker or logo visible", |ctx: FlowContext| async move {
            let spec = ctx.wait_spec(ctx.config().timeouts.main_marker())?;
            let marker = ctx.template(Marker::MainMarker)?;
            let logo = ctx.template(Marker::TargetLogo)?;
            let seen = ctx.matcher().wait_any_visible(&[marker, logo], spec).await?;
            Ok(seen.is_some())
        })
}

fn cheek_drag_stage() -> Stage {
    Stage::new("CheekDragStart")
        .precondition("app started on the main screen", |ctx: FlowContext| async move {
            if !start_app(&ctx).await? {
                return Ok(false);
            }
            ctx.wait_marker(Marker::TargetLogo, ctx.config().timeouts.drag_precondition())
                .await
        })
        .action(|ctx: FlowContext| async move {
            let size = ctx.session().screen_size().await?;
            info!(width = size.width, height = size.height, "Screen size");
            ctx.gestures().cheek_drag().await?;
            ctx.settle(ctx.config().settle.after_cheek_drag_ms).await
        })
        .verify("game started", |ctx: FlowContext| async move {
            ctx.wait_marker(Marker::GameStarted, ctx.config().timeouts.game_start_verify())
                .await
        })
}

fn game_exit_stage() -> Stage {
    Stage::new("GameExit")
        .precondition("app in foreground", |ctx: FlowContext| async move {
            Ok(ctx
                .session()
                .query_app_state(ctx.package())
                .await?
                .is_foreground())
        })
        .action(exit_through_dialog)
        .verify("app left the foreground", |ctx: FlowContext| async move {
            let state = ctx.session().query_app_state(ctx.package()).await?;
            info!(state = %state, "App state after exit");
            Ok(!state.is_foreground())
        })
}

async fn exit_through_dialog(ctx: FlowContext) -> Result<(), FlowError> {
    ctx.session().back().await?;
    ctx.settle(ctx.config().settle.after_back_ms).await?;
    ctx.tap_marker(Marker::ExitButton, ctx.config().timeouts.exit_button())
        .await?;
    ctx.settle(ctx.config().settle.exit_verification_ms).await
}
