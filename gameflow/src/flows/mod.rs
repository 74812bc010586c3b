//! Flow definitions for the target game.
//!
//! Each builder returns a fresh [`Flow`](crate::stages::Flow). Stages read
//! their timeouts, settle delays and selectors from the run configuration
//! carried by the [`FlowContext`], so the same definition serves every
//! device and account.

mod first_launch;
#[cfg(test)]
mod flow_tests;
mod login;
mod logout;
mod smoke;

pub use first_launch::first_launch_flow;
pub use login::{first_login_flow, re_login_flow};
pub use logout::logout_flow;
pub use smoke::{smoke_suite, SmokeCase};

use crate::context::FlowContext;
use crate::errors::FlowError;
use crate::stages::FailureInfo;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;

/// Failure hook that captures evidence under a fixed prefix.
pub(crate) fn capture_as(
    prefix: &'static str,
) -> impl Fn(FlowContext, FailureInfo) -> BoxFuture<'static, Option<PathBuf>> + Send + Sync + 'static
{
    move |ctx, _info| async move { ctx.capture_evidence(prefix).await }.boxed()
}

/// Activates the app and checks that a foreground package is reported.
pub(crate) async fn start_app(ctx: &FlowContext) -> Result<bool, FlowError> {
    ctx.session().activate_app(ctx.package()).await?;
    let package = ctx.session().current_package().await?;
    Ok(package.is_some_and(|p| !p.is_empty()))
}
