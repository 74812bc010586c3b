//! Flow tests against a scripted device on a paused clock.

#[cfg(test)]
mod tests {
    use crate::config::FlowConfig;
    use crate::core::{AppState, Rect, Verdict};
    use crate::flows::{first_launch_flow, first_login_flow, logout_flow, re_login_flow, smoke_suite};
    use crate::stages::{Flow, SequenceReport, StageSequencer};
    use crate::testing::{
        assert_block, assert_fail, assert_pass, assert_reason_contains, assert_verdicts,
        CollectingListener, TestContext,
    };
    use crate::transport::NativeSelector;
    use crate::vision::Marker;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const SPOT: Rect = Rect::new(500, 1000, 80, 40);
    const ACCOUNT: &str = "tester@example.com";

    async fn run(t: &TestContext, flow: &Flow) -> SequenceReport {
        StageSequencer::new()
            .run(flow, &t.ctx, &CollectingListener::new())
            .await
            .unwrap()
    }

    fn show(t: &TestContext, markers: &[Marker]) {
        for marker in markers {
            t.device.show_marker(*marker, SPOT);
        }
    }

    fn with_account() -> TestContext {
        let mut config = FlowConfig::default();
        config.account.email = ACCOUNT.to_string();
        TestContext::with_config(config)
    }

    fn smoke_case(index: u32) -> Flow {
        smoke_suite()
            .into_iter()
            .find(|case| case.index == index)
            .map(|case| case.flow)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_launch_happy_path() {
        let t = TestContext::new();
        let permission = NativeSelector::Id(t.ctx.config().selectors.permission_allow_id.clone());
        t.device.add_native(&permission, "Allow", Duration::ZERO, true);
        show(
            &t,
            &[
                Marker::DownloadButton,
                Marker::DownloadComplete,
                Marker::TermsScreen,
                Marker::TermsAgreeAll,
            ],
        );

        let report = run(&t, &first_launch_flow()).await;

        assert_verdicts(
            &report,
            &[
                ("clear_and_restart", Verdict::Pass),
                ("native_permissions", Verdict::Pass),
                ("initiate_download", Verdict::Pass),
                ("download", Verdict::Pass),
                ("proceed_to_terms", Verdict::Pass),
                ("terms_agreement", Verdict::Pass),
            ],
        );
        assert_eq!(t.device.cleared(), vec![t.ctx.package().to_string()]);
        assert_eq!(t.device.activated(), vec![t.ctx.package().to_string()]);
        assert_eq!(t.device.clicked().len(), 1);
        assert_eq!(t.device.taps().len(), 3);
        assert!(t
            .evidence
            .prefixes()
            .iter()
            .any(|p| p == "DEBUG_download_complete_verified_270sec"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_launch_without_permission_dialog() {
        let t = TestContext::new();
        show(
            &t,
            &[
                Marker::DownloadButton,
                Marker::DownloadComplete,
                Marker::TermsScreen,
                Marker::TermsAgreeAll,
            ],
        );

        let report = run(&t, &first_launch_flow()).await;

        assert!(report.passed());
        assert!(t.device.clicked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_launch_download_timeout_skips_terms() {
        let t = TestContext::new();
        show(&t, &[Marker::DownloadButton, Marker::TermsAgreeAll]);

        let report = run(&t, &first_launch_flow()).await;

        assert_fail(report.outcome_of("download").unwrap());
        assert_eq!(report.not_run, vec!["proceed_to_terms", "terms_agreement"]);
        assert_eq!(
            t.evidence.prefixes(),
            vec!["DEBUG_download_timeout_360sec".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_launch_missing_download_button() {
        let t = TestContext::new();

        let report = run(&t, &first_launch_flow()).await;

        assert_fail(report.outcome_of("initiate_download").unwrap());
        assert!(t.evidence.contains("DEBUG_download_button_not_found"));
        assert_eq!(report.not_run.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terms_tapped_when_screen_marker_missing() {
        let t = TestContext::new();
        show(
            &t,
            &[
                Marker::DownloadButton,
                Marker::DownloadComplete,
                Marker::TermsAgreeAll,
            ],
        );

        let report = run(&t, &first_launch_flow()).await;

        assert_pass(report.outcome_of("terms_agreement").unwrap());
        assert!(t.evidence.contains("DEBUG_terms_screen_not_found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_login_selects_configured_account() {
        let t = with_account();
        show(&t, &[Marker::GoogleLogin, Marker::TargetLogo]);
        t.device.add_native(
            &NativeSelector::ExactText(ACCOUNT.to_string()),
            ACCOUNT,
            Duration::from_secs(2),
            true,
        );

        let report = run(&t, &first_login_flow()).await;

        assert_verdicts(
            &report,
            &[
                ("google_login_button", Verdict::Pass),
                ("account_selection", Verdict::Pass),
                ("verify_login", Verdict::Pass),
            ],
        );
        assert_eq!(t.device.clicked().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_account_selection_timeout_captures_evidence() {
        let t = with_account();
        show(&t, &[Marker::GoogleLogin, Marker::TargetLogo]);
        t.device.add_native(
            &NativeSelector::ExactText("someone.else@example.com".to_string()),
            "someone.else@example.com",
            Duration::ZERO,
            true,
        );

        let report = run(&t, &first_login_flow()).await;

        let outcome = report.outcome_of("account_selection").unwrap();
        assert_fail(outcome);
        assert_reason_contains(outcome, ACCOUNT);
        assert!(t.evidence.contains("DEBUG_login_account_selection_timeout"));
        assert_eq!(report.not_run, vec!["verify_login"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_account_is_never_clicked() {
        let t = with_account();
        show(&t, &[Marker::GoogleLogin]);
        t.device.add_native(
            &NativeSelector::ExactText(ACCOUNT.to_string()),
            ACCOUNT,
            Duration::ZERO,
            false,
        );

        let report = run(&t, &first_login_flow()).await;

        assert_fail(report.outcome_of("account_selection").unwrap());
        assert!(t.device.clicked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_account_selection_blocks_without_account() {
        let t = TestContext::new();
        show(&t, &[Marker::GoogleLogin]);

        let report = run(&t, &first_login_flow()).await;

        let outcome = report.outcome_of("account_selection").unwrap();
        assert_block(outcome);
        assert_reason_contains(outcome, "target account configured");
    }

    #[tokio::test(start_paused = true)]
    async fn test_re_login_skips_chooser() {
        let t = TestContext::new();
        show(&t, &[Marker::GoogleLogin, Marker::TargetLogo]);

        let report = run(&t, &re_login_flow()).await;

        assert!(report.passed());
        assert_eq!(t.device.count("find_native"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_without_confirmation_popup() {
        let t = TestContext::new();
        show(
            &t,
            &[
                Marker::GameStarted,
                Marker::MenuButton,
                Marker::MenuPopup,
                Marker::SettingsButton,
                Marker::SettingsPopup,
                Marker::EtcButton,
                Marker::LogoutButton,
                Marker::LogoutConfirmButton,
                Marker::TermsScreen,
            ],
        );

        let report = run(&t, &logout_flow()).await;

        assert!(report.passed());
        assert_eq!(report.records.len(), 9);
        assert_eq!(t.device.taps().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_stops_at_missing_popup() {
        let t = TestContext::new();
        show(
            &t,
            &[
                Marker::GameStarted,
                Marker::MenuButton,
                Marker::MenuPopup,
                Marker::SettingsButton,
            ],
        );

        let report = run(&t, &logout_flow()).await;

        let outcome = report.outcome_of("verify_settings_popup").unwrap();
        assert_fail(outcome);
        assert_reason_contains(outcome, "settings_popup visible");
        assert!(t.evidence.contains("DEBUG_logout_settings_popup_not_found"));
        assert_eq!(report.not_run.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_smoke_start_app() {
        let t = TestContext::new();

        let report = run(&t, &smoke_case(1)).await;

        assert!(report.passed());
        assert_eq!(t.device.activated().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_smoke_main_logo_accepts_either_marker() {
        let t = TestContext::new();
        show(&t, &[Marker::TargetLogo]);

        let report = run(&t, &smoke_case(2)).await;

        assert!(report.passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_smoke_cheek_drag_blocks_off_main_screen() {
        let t = TestContext::new();

        let report = run(&t, &smoke_case(3)).await;

        let outcome = &report.records[0].outcome;
        assert_block(outcome);
        assert_reason_contains(outcome, "app started on the main screen");
        assert!(t.device.drags().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_smoke_cheek_drag_starts_game() {
        let t = TestContext::new();
        show(&t, &[Marker::TargetLogo]);
        t.device
            .show_marker_after(Marker::GameStarted, SPOT, Duration::from_secs(10));

        let report = run(&t, &smoke_case(3)).await;

        assert!(report.passed());
        assert_eq!(t.device.drags().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_smoke_game_exit_through_dialog() {
        let t = TestContext::new();
        t.device
            .script_app_states([AppState::Foreground, AppState::NotRunning]);
        show(&t, &[Marker::ExitButton]);

        let report = run(&t, &smoke_case(4)).await;

        assert!(report.passed());
        assert_eq!(t.device.back_presses(), 1);
        assert_eq!(t.device.taps().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_smoke_game_exit_blocks_when_not_running() {
        let t = TestContext::new();

        let report = run(&t, &smoke_case(4)).await;

        assert_block(&report.records[0].outcome);
        assert_eq!(t.device.back_presses(), 0);
    }
}
