//! Deploy pipeline
//!
//! Wires the deploy stages into a [`TaskGraph`], runs it and then closes
//! the connection, on every path.

use futures::future::{BoxFuture, FutureExt};
use hoist_core::domain::ReleaseId;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::graph::{GraphError, GraphReport, TaskGraph};
use crate::context::DeployContext;
use crate::process::ExecError;
use crate::service::{
    DeploySummary, Notifier, finalize_release, prepare_server, prune_releases, run_after_hooks,
    run_builds, upload_app, upload_assets,
};

/// One node of the deploy graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Connect,
    BuildApp,
    BuildAssets,
    Prepare,
    UploadApp,
    UploadAssets,
    Finalize,
    AfterHook,
    Retain,
    Notify,
}

impl Stage {
    /// Every stage, each listed after its dependencies
    pub const ALL: [Stage; 10] = [
        Stage::Connect,
        Stage::BuildApp,
        Stage::BuildAssets,
        Stage::Prepare,
        Stage::UploadApp,
        Stage::UploadAssets,
        Stage::Finalize,
        Stage::AfterHook,
        Stage::Retain,
        Stage::Notify,
    ];

    pub fn dependencies(self) -> &'static [Stage] {
        match self {
            Stage::Connect | Stage::BuildApp | Stage::BuildAssets => &[],
            Stage::Prepare => &[Stage::Connect],
            Stage::UploadApp => &[Stage::Prepare, Stage::BuildApp],
            Stage::UploadAssets => &[Stage::Prepare, Stage::BuildAssets],
            Stage::Finalize => &[Stage::UploadApp, Stage::UploadAssets],
            Stage::AfterHook => &[Stage::Finalize],
            Stage::Retain => &[Stage::AfterHook],
            Stage::Notify => &[Stage::Retain],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Connect => "connect",
            Stage::BuildApp => "buildApp",
            Stage::BuildAssets => "buildAssets",
            Stage::Prepare => "prepare",
            Stage::UploadApp => "uploadApp",
            Stage::UploadAssets => "uploadAssets",
            Stage::Finalize => "finalize",
            Stage::AfterHook => "afterHook",
            Stage::Retain => "retain",
            Stage::Notify => "notify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a deploy run
#[derive(Debug)]
pub struct DeployReport {
    pub release: ReleaseId,
    pub tasks: GraphReport<Stage>,
    /// Result of closing the connection; a failure here does not fail the deploy
    pub teardown: Result<(), ExecError>,
    pub elapsed: Duration,
}

impl DeployReport {
    /// Every stage succeeded
    pub fn succeeded(&self) -> bool {
        self.tasks.succeeded()
    }

    /// The new release went live (it may still have failed afterwards)
    pub fn deployed(&self) -> bool {
        self.tasks
            .outcome(Stage::Finalize)
            .is_some_and(|outcome| outcome.is_success())
    }

    /// Stage whose failure halted the run, and its error
    pub fn failure(&self) -> Option<(Stage, &anyhow::Error)> {
        self.tasks.failure()
    }
}

/// The deploy pipeline for one release
///
/// Timing starts when the pipeline is built.
pub struct Pipeline {
    ctx: Arc<DeployContext>,
    graph: TaskGraph<Stage>,
    started: Instant,
}

impl Pipeline {
    /// Builds the stage graph
    ///
    /// # Arguments
    /// * `ctx` - Context shared by every stage
    /// * `notifier` - Receives the summary once everything else succeeded
    pub fn new(
        ctx: Arc<DeployContext>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, GraphError<Stage>> {
        let started = Instant::now();
        let mut graph = TaskGraph::new();

        for stage in Stage::ALL {
            let task = stage_task(stage, ctx.clone(), notifier.clone(), started);
            graph.add(stage, stage.dependencies(), task)?;
        }

        Ok(Self {
            ctx,
            graph,
            started,
        })
    }

    /// Runs every stage, then closes the connection exactly once
    ///
    /// Never fails: the outcome of each stage is in the report.
    pub async fn run(self) -> DeployReport {
        let plan = &self.ctx.plan;
        info!(
            "Deploying release {} to {} ({})",
            plan.release, plan.environment.name, plan.environment.target
        );

        let tasks = self.graph.run().await;

        let teardown = self.ctx.connection.close().await;
        if let Err(e) = &teardown {
            warn!("Failed to close connection to {}: {}", plan.environment.target, e);
        }

        DeployReport {
            release: plan.release.clone(),
            tasks,
            teardown,
            elapsed: self.started.elapsed(),
        }
    }
}

fn stage_task(
    stage: Stage,
    ctx: Arc<DeployContext>,
    notifier: Arc<dyn Notifier>,
    started: Instant,
) -> BoxFuture<'static, anyhow::Result<()>> {
    match stage {
        Stage::Connect => async move { ctx.connection.open().await }.boxed(),
        Stage::BuildApp => async move {
            run_builds(ctx.executor.clone(), "app", &ctx.plan.app_build_commands)
                .await
                .map_err(anyhow::Error::from)
        }
        .boxed(),
        Stage::BuildAssets => async move {
            run_builds(ctx.executor.clone(), "assets", &ctx.plan.asset_build_commands)
                .await
                .map_err(anyhow::Error::from)
        }
        .boxed(),
        Stage::Prepare => {
            async move { prepare_server(&ctx).await.map_err(anyhow::Error::from) }.boxed()
        }
        Stage::UploadApp => {
            async move { upload_app(&ctx).await.map_err(anyhow::Error::from) }.boxed()
        }
        Stage::UploadAssets => {
            async move { upload_assets(&ctx).await.map_err(anyhow::Error::from) }.boxed()
        }
        Stage::Finalize => {
            async move { finalize_release(&ctx).await.map_err(anyhow::Error::from) }.boxed()
        }
        Stage::AfterHook => {
            async move { run_after_hooks(&ctx).await.map_err(anyhow::Error::from) }.boxed()
        }
        Stage::Retain => async move {
            prune_releases(&ctx)
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from)
        }
        .boxed(),
        Stage::Notify => async move {
            let summary = DeploySummary::collect(&ctx.plan.environment.name, started.elapsed());
            notifier.notify(&summary).await
        }
        .boxed(),
    }
}
