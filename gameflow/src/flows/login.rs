//! Google login, first time and with a remembered account.

use super::capture_as;
use crate::context::FlowContext;
use crate::errors::FlowError;
use crate::stages::{Flow, Stage};
use crate::transport::NativeSelector;
use crate::vision::Marker;
use tracing::{info, warn};

/// Lists every account shown by the chooser.
const ACCOUNT_LIST_XPATH: &str = "//android.widget.TextView[contains(@text, '@')]";

/// Builds the three-stage first login flow.
///
/// The chooser is native UI, so the account is matched by its exact text
/// instead of a template.
#[must_use]
pub fn first_login_flow() -> Flow {
    Flow::new("login")
        .stage(google_login_stage())
        .stage(
            Stage::new("account_selection")
                .precondition("target account configured", |ctx: FlowContext| async move {
                    Ok(!ctx.config().account.email.trim().is_empty())
                })
                .action(select_account)
                .on_failure(capture_as("DEBUG_login_account_selection_timeout")),
        )
        .stage(verify_login_stage())
}

/// Builds the three-stage re-login flow. The chooser is skipped.
#[must_use]
pub fn re_login_flow() -> Flow {
    Flow::new("re_login")
        .stage(google_login_stage())
        .stage(Stage::new("auto_login").action(|ctx: FlowContext| async move {
            ctx.settle(ctx.config().settle.after_account_select_ms).await
        }))
        .stage(verify_login_stage())
}

fn google_login_stage() -> Stage {
    Stage::new("google_login_button")
        .action(tap_google_login)
        .on_failure(capture_as("DEBUG_google_login_button_not_found"))
}

fn verify_login_stage() -> Stage {
    Stage::new("verify_login")
        .verify("main screen logo visible", |ctx: FlowContext| async move {
            ctx.wait_marker(Marker::TargetLogo, ctx.config().timeouts.login_processing())
                .await
        })
        .on_failure(capture_as("DEBUG_login_login_verification_failed"))
}

async fn tap_google_login(ctx: FlowContext) -> Result<(), FlowError> {
    ctx.tap_marker(Marker::GoogleLogin, ctx.config().timeouts.main_marker())
        .await?;
    ctx.settle(ctx.config().settle.after_login_tap_ms).await
}

async fn select_account(ctx: FlowContext) -> Result<(), FlowError> {
    let email = ctx.config().account.email.trim().to_string();
    let selector = NativeSelector::ExactText(email.clone());
    let timeout = ctx.config().timeouts.account_selection();
    let spec = ctx.wait_spec(timeout)?;
    let session = ctx.session();
    let wanted = &selector;

    let account = ctx
        .waiter()
        .wait_for("account_selection", spec, || async move {
            let element = session.find_native(wanted).await?;
            Ok(session.element_enabled(&element).await?.then_some(element))
        })
        .await?;

    let Some(account) = account else {
        let visible = visible_accounts(&ctx).await;
        warn!(target_account = %email, visible = ?visible, "Target account not offered");
        return Err(FlowError::timeout(format!("account {email}"), timeout));
    };

    session.click_native(&account).await?;
    info!(account = %email, "Account selected");
    ctx.settle(ctx.config().settle.after_account_select_ms).await
}

/// Account addresses currently on screen. Lookup errors yield what was read so far.
async fn visible_accounts(ctx: &FlowContext) -> Vec<String> {
    let session = ctx.session();
    let selector = NativeSelector::XPath(ACCOUNT_LIST_XPATH.to_string());
    let Ok(elements) = session.find_all_native(&selector).await else {
        return Vec::new();
    };

    let mut accounts = Vec::with_capacity(elements.len());
    for element in &elements {
        match session.element_text(element).await {
            Ok(text) if text.contains('@') => accounts.push(text.trim().to_string()),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    accounts
}
