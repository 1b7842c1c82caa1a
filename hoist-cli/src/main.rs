//! Hoist CLI
//!
//! Builds a project locally and deploys it to a single server over ssh.

mod commands;

use clap::Parser;
use colored::*;
use commands::{Commands, GlobalOptions, handle_command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hoist", version)]
#[command(about = "Build locally, deploy to one server over ssh", long_about = None)]
struct Cli {
    /// Path to the configuration file (default: hoist.json, then config/hoist.json)
    #[arg(short, long, global = true, env = "HOIST_CONFIG")]
    config: Option<PathBuf>,

    /// Log every command and its output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let options = GlobalOptions {
        config: cli.config,
    };

    match handle_command(cli.command, &options).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// RUST_LOG wins over `--verbose`
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "hoist=debug" } else { "hoist=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::try_parse_from(["hoist", "--verbose", "deploy", "production"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Deploy { ref environment } if environment == "production"));
    }

    #[test]
    fn test_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["hoist", "deploy", "staging", "--config", "ops/hoist.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ops/hoist.json")));
    }

    #[test]
    fn test_deploy_requires_environment() {
        assert!(Cli::try_parse_from(["hoist", "deploy"]).is_err());
    }
}
