//! Local builds
//!
//! Every command of a build set runs as its own process, all at once.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use crate::process::ExecError;
use crate::remote::RemoteExecutor;

/// Runs `commands` concurrently and waits for all of them
///
/// Returns the first failure observed. Commands still running at that point
/// are left to finish in the background; their results are ignored.
///
/// # Arguments
/// * `executor` - Executor used to spawn the shell processes
/// * `set` - Name of the build set, for logging ("app", "assets")
/// * `commands` - Shell commands to run
pub async fn run_builds(
    executor: Arc<RemoteExecutor>,
    set: &str,
    commands: &[String],
) -> Result<(), ExecError> {
    if commands.is_empty() {
        debug!("No {} build commands configured", set);
        return Ok(());
    }

    info!("Building {} ({} commands)", set, commands.len());

    let mut pending: FuturesUnordered<_> = commands
        .iter()
        .cloned()
        .map(|command| {
            let executor = executor.clone();
            let label = command.clone();
            let handle = tokio::spawn(async move {
                executor.run_local(&command, &command).await.map(|_| ())
            });
            async move { (label, handle.await) }
        })
        .collect();

    while let Some((label, joined)) = pending.next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => {
                return Err(ExecError::Interrupted {
                    label,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(())
}
