//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod deploy;
mod init;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use std::process::ExitCode;

/// Options shared by every command
pub struct GlobalOptions {
    /// Explicit configuration file, if given
    pub config: Option<PathBuf>,
}

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build and deploy to an environment
    Deploy {
        /// Environment name, as listed in the configuration file
        environment: String,
    },
    /// Write a sample configuration file
    Init {
        /// Where to write it
        #[arg(short, long, default_value = "hoist.json")]
        path: PathBuf,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `options` - Global options
///
/// # Returns
/// The process exit code, or an error raised before anything was deployed
pub async fn handle_command(command: Commands, options: &GlobalOptions) -> Result<ExitCode> {
    match command {
        Commands::Deploy { environment } => deploy::handle_deploy(&environment, options).await,
        Commands::Init { path } => init::handle_init(&path).map(|_| ExitCode::SUCCESS),
    }
}
