//! After-deploy hooks

use tracing::debug;

use crate::command::CommandChain;
use crate::context::DeployContext;
use crate::process::ExecError;

/// Runs the environment's after-deploy commands, if any
///
/// The local command runs first, then the remote one inside the new release.
pub async fn run_after_hooks(ctx: &DeployContext) -> Result<(), ExecError> {
    let env = &ctx.plan.environment;

    if !env.has_after_hook() {
        debug!("No after deploy hook configured for {}", env.name);
        return Ok(());
    }

    if let Some(command) = &env.after_deploy_command {
        ctx.executor.run_local("after deploy hook", command).await?;
    }

    if let Some(command) = &env.after_deploy_remote_command {
        let chain = CommandChain::new()
            .then(format!("cd {}", ctx.plan.release_dir()))
            .then(command.clone());

        ctx.executor
            .run_remote(ctx.handle(), "after deploy remote hook", &chain)
            .await?;
    }

    Ok(())
}
