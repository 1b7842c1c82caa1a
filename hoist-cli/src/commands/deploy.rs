//! Deploy command handler

use anyhow::{Context, Result};
use colored::*;
use hoist_core::config::Config;
use hoist_core::domain::ReleaseId;
use hoist_runner::scheduler::TaskOutcome;
use hoist_runner::service::notify::format_duration;
use hoist_runner::{
    CampfireNotifier, DeployContext, DeployPlan, DeployReport, NoopNotifier, Notifier, Pipeline,
    RunnerConfig, TokioProcessRunner,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use super::GlobalOptions;

/// Deploys the project to `environment`
///
/// Configuration problems are returned as errors before anything runs. Once
/// the pipeline started, its outcome is printed and turned into the exit code.
pub async fn handle_deploy(environment: &str, options: &GlobalOptions) -> Result<ExitCode> {
    let config_path = match &options.config {
        Some(path) => path.clone(),
        None => locate_config()?,
    };

    let config = Config::load(&config_path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
    let environment = config.environment(environment)?;

    let runner_config = RunnerConfig::from_env();
    runner_config.validate()?;

    let notifier: Arc<dyn Notifier> = match config.campfire() {
        Some(campfire) => Arc::new(CampfireNotifier::from_config(campfire)?),
        None => Arc::new(NoopNotifier),
    };

    info!("Using configuration {}", config_path.display());

    let plan = DeployPlan::from_config(&config, environment, ReleaseId::now());
    let ctx = DeployContext::new(plan, Arc::new(TokioProcessRunner::new()), runner_config);
    let pipeline = Pipeline::new(ctx, notifier).context("Failed to build the deploy pipeline")?;

    let report = pipeline.run().await;
    print_report(&report);

    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn locate_config() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    Ok(Config::locate(cwd)?)
}

fn print_report(report: &DeployReport) {
    println!();
    for (stage, outcome) in &report.tasks.outcomes {
        match outcome {
            TaskOutcome::Succeeded => println!("  {} {}", "✓".green(), stage),
            TaskOutcome::Failed(_) => println!("  {} {}", "✗".red(), stage),
            TaskOutcome::Skipped => println!("  {} {}", "-".dimmed(), stage.to_string().dimmed()),
        }
    }
    println!();

    if let Err(e) = &report.teardown {
        println!("{} could not close the ssh connection: {}", "warning:".yellow().bold(), e);
    }

    let elapsed = format_duration(report.elapsed);

    match report.failure() {
        None => println!(
            "{} release {} in {}",
            "Deployed".green().bold(),
            report.release.to_string().cyan(),
            elapsed
        ),
        Some((stage, error)) => {
            eprintln!("{} {} failed after {}", "error:".red().bold(), stage, elapsed);
            eprintln!("{:#}", error);

            if report.deployed() {
                eprintln!(
                    "{} release {} is live, only the steps after it failed",
                    "note:".yellow().bold(),
                    report.release
                );
            }
        }
    }
}
