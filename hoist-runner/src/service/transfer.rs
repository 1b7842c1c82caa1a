//! Artifact upload
//!
//! Pushes the local build output into the shared staging area on the
//! target, tunnelled through the multiplexed connection.

use tracing::info;

use super::prepare::{APP_STAGING, ASSETS_STAGING};
use crate::context::DeployContext;
use crate::process::ExecError;

/// Uploads the application payload to `shared/dist`
pub async fn upload_app(ctx: &DeployContext) -> Result<(), ExecError> {
    let destination = ctx.plan.environment.shared_path(APP_STAGING);
    ctx.executor
        .transfer(
            ctx.handle(),
            "rsync app files",
            &ctx.plan.built_app_dir,
            &destination,
        )
        .await
        .map(|_| ())
}

/// Uploads the assets to `shared/assets`
///
/// Succeeds immediately when no asset build is configured.
pub async fn upload_assets(ctx: &DeployContext) -> Result<(), ExecError> {
    if !ctx.plan.has_assets() {
        info!("No asset build configured, skipping asset upload");
        return Ok(());
    }

    let destination = ctx.plan.environment.shared_path(ASSETS_STAGING);
    ctx.executor
        .transfer(
            ctx.handle(),
            "rsync assets",
            &ctx.plan.built_assets_dir,
            &destination,
        )
        .await
        .map(|_| ())
}
