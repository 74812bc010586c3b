//! `gameflow` command-line runner.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gameflow::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "gameflow", version, about = "Run gameflow suites against a device")]
struct Cli {
    /// JSON configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log line format: pretty or json.
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one suite.
    Run {
        /// smoke, first_launch, first_login, re_login or logout.
        suite: Suite,

        /// Append results to a JSON-lines file instead of the spreadsheet.
        #[arg(long)]
        dry_run: bool,

        /// Results file used by --dry-run.
        #[arg(long, default_value = "build/reports/results.jsonl")]
        results: PathBuf,
    },
    /// List the available suites and their flows.
    Suites,
    /// Validate the configuration and print it.
    Validate,
}

fn load_config(path: Option<&PathBuf>) -> Result<FlowConfig> {
    let config = match path {
        Some(path) => FlowConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => {
            let config = FlowConfig::default().apply_env();
            config.validate().context("validating default configuration")?;
            config
        }
    };
    Ok(config)
}

fn sink_for(config: &FlowConfig, dry_run: bool, results: PathBuf) -> Result<Arc<dyn ResultSink>> {
    if dry_run {
        info!(path = %results.display(), "Dry run, results go to a local file");
        return Ok(Arc::new(JsonlResultSink::new(results)));
    }
    let sheets = GoogleSheetsSink::from_config(&config.recording)
        .context("configuring the spreadsheet sink (use --dry-run to skip it)")?;
    Ok(Arc::new(sheets))
}

async fn run(config: FlowConfig, suite: Suite, dry_run: bool, results: PathBuf) -> Result<bool> {
    let sink = sink_for(&config, dry_run, results)?;
    let evidence = Arc::new(FsEvidenceStore::new(config.evidence.directory.clone()));
    let orchestrator = Orchestrator::new(config, Arc::new(AppiumSessionFactory), evidence, sink)?;

    let cancel = orchestrator.cancel_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            cancel.cancel("interrupted by user");
        }
    });

    let report = orchestrator
        .run(suite)
        .await
        .with_context(|| format!("running suite {suite}"))?;

    for case in &report.cases {
        println!(
            "TC{:02} {:<22} {}",
            case.index,
            case.name,
            case.outcome.summary()
        );
    }
    for case in report.failures() {
        if let Some(stage) = case.report.first_non_pass() {
            warn!(
                test_case = %case.name,
                stage = %stage.name,
                verdict = %stage.outcome.verdict,
                reason = %stage.outcome.reason_or_empty(),
                not_run = case.report.not_run.len(),
                "Case stopped"
            );
        }
    }
    Ok(report.passed())
}

fn list_suites() {
    for suite in Suite::ALL {
        let flows: Vec<Flow> = match suite {
            Suite::Smoke => smoke_suite().into_iter().map(|case| case.flow).collect(),
            Suite::FirstLaunch => vec![first_launch_flow()],
            Suite::FirstLogin => vec![first_login_flow()],
            Suite::ReLogin => vec![re_login_flow()],
            Suite::Logout => vec![logout_flow()],
        };
        let stages: Vec<&str> = flows.iter().flat_map(Flow::stage_names).collect();
        println!("{:<14} {}", suite.as_str(), stages.join(" > "));
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Command::Run {
            suite,
            dry_run,
            results,
        } => {
            let config = load_config(cli.config.as_ref())?;
            if run(config, suite, dry_run, results).await? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Suites => {
            list_suites();
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate => {
            let config = load_config(cli.config.as_ref())?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
            if config.recording.spreadsheet_id.is_none() {
                warn!("recording.spreadsheet_id is not set, only --dry-run will work");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
