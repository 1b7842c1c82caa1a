//! Deploy context
//!
//! Everything a single deploy run needs, built once up front and shared
//! read-only by every pipeline task:
//! - The resolved plan (environment, release id, build commands, local paths)
//! - The executor that runs local and remote commands
//! - The multiplexed connection to the target

use hoist_core::config::Config;
use hoist_core::domain::{Environment, ReleaseId};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RunnerConfig;
use crate::connection::{ConnectionHandle, ConnectionMultiplexer};
use crate::process::ProcessRunner;
use crate::remote::RemoteExecutor;

/// What a deploy run will do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub environment: Environment,
    pub release: ReleaseId,
    pub app_build_commands: Vec<String>,
    pub asset_build_commands: Vec<String>,
    pub built_app_dir: PathBuf,
    pub built_assets_dir: PathBuf,
    pub keep_releases: usize,
}

impl DeployPlan {
    /// Builds the plan for a resolved environment
    ///
    /// # Arguments
    /// * `config` - Validated project configuration
    /// * `environment` - Environment selected from that configuration
    /// * `release` - Identifier of the release being created
    pub fn from_config(config: &Config, environment: Environment, release: ReleaseId) -> Self {
        Self {
            environment,
            release,
            app_build_commands: config.app_build_commands.clone(),
            asset_build_commands: config.asset_build_commands.clone(),
            built_app_dir: PathBuf::from(&config.built_app_dir),
            built_assets_dir: PathBuf::from(&config.built_assets_dir),
            keep_releases: config.keep_releases,
        }
    }

    /// Whether assets are built and uploaded
    pub fn has_assets(&self) -> bool {
        !self.asset_build_commands.is_empty()
    }

    /// Remote directory of the release being created
    pub fn release_dir(&self) -> String {
        self.environment.release_dir(&self.release)
    }
}

/// Shared state of one deploy run
pub struct DeployContext {
    pub plan: DeployPlan,
    pub executor: Arc<RemoteExecutor>,
    pub connection: ConnectionMultiplexer,
}

impl DeployContext {
    /// Creates a new deploy context
    ///
    /// # Arguments
    /// * `plan` - The deploy plan
    /// * `runner` - Process runner used for every external command
    /// * `config` - Runner configuration
    pub fn new(plan: DeployPlan, runner: Arc<dyn ProcessRunner>, config: RunnerConfig) -> Arc<Self> {
        let executor = Arc::new(RemoteExecutor::new(runner, config));
        let connection =
            ConnectionMultiplexer::new(plan.environment.target.clone(), executor.clone());

        Arc::new(Self {
            plan,
            executor,
            connection,
        })
    }

    /// Handle of the multiplexed connection, valid once `connect` succeeded
    pub fn handle(&self) -> &ConnectionHandle {
        self.connection.handle()
    }
}
