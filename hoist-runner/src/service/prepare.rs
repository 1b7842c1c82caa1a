//! Server preparation
//!
//! Creates the release directory skeleton and points its per-host state
//! (logs, pids, uploaded files, assets) into the shared area.

use hoist_core::domain::environment::join;

use crate::command::CommandChain;
use crate::context::{DeployContext, DeployPlan};
use crate::process::ExecError;

/// Staging directory, under `shared/`, the application payload is uploaded to
pub const APP_STAGING: &str = "dist";

/// Directory, under `shared/`, the assets are uploaded to
pub const ASSETS_STAGING: &str = "assets";

/// Composite command preparing the release directory
pub fn prepare_chain(plan: &DeployPlan) -> CommandChain {
    let env = &plan.environment;
    let release = plan.release_dir();
    let public = join(&release, "public");
    let tmp = join(&release, "tmp");

    let chain = CommandChain::new()
        .ensure_dir(&env.shared_path("log"))
        .ensure_dir(&release)
        .then(format!("chmod -R g+w {}", release))
        .then_tolerant(format!("rm -rf {}", join(&public, "system")))
        .mkdir(&public)
        .symlink(&env.shared_path("system"), &join(&public, "system"))
        .remove(&join(&release, "log"))
        .symlink(&env.shared_path("log"), &join(&release, "log"))
        .remove(&join(&tmp, "pids"))
        .mkdir(&tmp)
        .symlink(&env.shared_path("pids"), &join(&tmp, "pids"));

    if !plan.has_assets() {
        return chain;
    }

    let assets = env.shared_path(ASSETS_STAGING);
    chain
        .remove(&join(&public, "assets"))
        .mkdir(&public)
        .mkdir(&assets)
        .symlink(&assets, &join(&public, "assets"))
}

/// Runs the preparation on the target
pub async fn prepare_server(ctx: &DeployContext) -> Result<(), ExecError> {
    let chain = prepare_chain(&ctx.plan);
    ctx.executor
        .run_remote(ctx.handle(), "prepare server", &chain)
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::plan;

    #[test]
    fn test_prepare_chain_without_assets() {
        let plan = plan(&["make"], &[]);
        let rendered = prepare_chain(&plan).render();

        assert_eq!(
            rendered,
            "if [ ! -d /srv/app/shared/log ]; then mkdir -p /srv/app/shared/log; fi \
             && if [ ! -d /srv/app/releases/20240103000000 ]; then mkdir -p /srv/app/releases/20240103000000; fi \
             && chmod -R g+w /srv/app/releases/20240103000000 \
             && (rm -rf /srv/app/releases/20240103000000/public/system || true) \
             && mkdir -p /srv/app/releases/20240103000000/public \
             && ln -s /srv/app/shared/system /srv/app/releases/20240103000000/public/system \
             && rm -rf /srv/app/releases/20240103000000/log \
             && ln -s /srv/app/shared/log /srv/app/releases/20240103000000/log \
             && rm -rf /srv/app/releases/20240103000000/tmp/pids \
             && mkdir -p /srv/app/releases/20240103000000/tmp \
             && ln -s /srv/app/shared/pids /srv/app/releases/20240103000000/tmp/pids"
        );
        assert!(!rendered.contains("assets"));
    }

    #[test]
    fn test_prepare_chain_with_assets() {
        let plan = plan(&["make"], &["make css"]);
        let chain = prepare_chain(&plan);

        assert_eq!(chain.len(), 15);
        assert!(chain.render().ends_with(
            "mkdir -p /srv/app/shared/assets \
             && ln -s /srv/app/shared/assets /srv/app/releases/20240103000000/public/assets"
        ));
    }
}
