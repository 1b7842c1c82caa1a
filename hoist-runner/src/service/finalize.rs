//! Release switch
//!
//! Copies the staged payload into the new release, repoints `current` at it
//! and restarts the service.

use hoist_core::domain::environment::join;
use tracing::info;

use super::prepare::APP_STAGING;
use crate::command::CommandChain;
use crate::context::{DeployContext, DeployPlan};
use crate::process::ExecError;

/// Composite command making the new release live
///
/// The `current` link is always removed and recreated so a stale link left
/// by an earlier failed run does not matter.
pub fn finalize_chain(plan: &DeployPlan) -> CommandChain {
    let env = &plan.environment;
    let release = plan.release_dir();
    let current = env.current_link();
    let staged = join(&env.shared_path(APP_STAGING), "*");

    let chain = CommandChain::new()
        .then(format!("cp -r {} {}", staged, release))
        .then(format!("rm -f {}", current))
        .symlink(&release, &current);

    match &env.restart_command {
        Some(restart) => chain.then(format!("({})", restart)),
        None => chain,
    }
}

pub async fn finalize_release(ctx: &DeployContext) -> Result<(), ExecError> {
    let chain = finalize_chain(&ctx.plan);
    ctx.executor
        .run_remote(ctx.handle(), "finalize server", &chain)
        .await?;

    info!("Release {} is live", ctx.plan.release);
    Ok(())
}
