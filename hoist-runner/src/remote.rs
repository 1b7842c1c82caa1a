//! Remote executor
//!
//! Turns pipeline operations into concrete process invocations:
//! - local shell commands (builds, local hooks)
//! - remote commands over the multiplexed ssh connection
//! - rsync transfers tunnelled through the same connection
//! - control master start/stop

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::command::CommandChain;
use crate::config::RunnerConfig;
use crate::connection::ConnectionHandle;
use crate::process::{CommandOutput, ExecError, ProcessRunner, ProcessSpec};

/// Builds and runs every external command of a deploy
pub struct RemoteExecutor {
    runner: Arc<dyn ProcessRunner>,
    config: RunnerConfig,
}

impl RemoteExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: RunnerConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    // ========================================================================
    // Command builders
    // ========================================================================

    /// `<shell> -c <command>`
    pub fn local_spec(&self, label: &str, command: &str) -> ProcessSpec {
        ProcessSpec::new(label, &self.config.shell).args(["-c", command])
    }

    /// `ssh -p PORT -S SOCKET -l USER HOST COMMAND`
    pub fn remote_spec(&self, handle: &ConnectionHandle, label: &str, command: &str) -> ProcessSpec {
        let target = handle.target();
        ProcessSpec::new(label, &self.config.ssh_program).args([
            "-p".to_string(),
            target.port.to_string(),
            "-S".to_string(),
            handle.socket_path(),
            "-l".to_string(),
            target.user.clone(),
            target.host.clone(),
            command.to_string(),
        ])
    }

    /// rsync of the contents of `source` into `destination` on the target
    pub fn transfer_spec(
        &self,
        handle: &ConnectionHandle,
        label: &str,
        source: &Path,
        destination: &str,
    ) -> ProcessSpec {
        let target = handle.target();
        let tunnel = format!(
            "{} -p {} -S '{}'",
            self.config.ssh_program,
            target.port,
            handle.socket_path()
        );

        // Trailing slash: copy the directory contents, not the directory itself
        let mut source = source.to_string_lossy().to_string();
        if !source.ends_with('/') {
            source.push('/');
        }

        ProcessSpec::new(label, &self.config.rsync_program).args([
            "-e".to_string(),
            tunnel,
            "--recursive".to_string(),
            "--times".to_string(),
            "--compress".to_string(),
            "--human-readable".to_string(),
            source,
            format!("{}:{}", target.destination(), destination),
        ])
    }

    /// Starts a backgrounded ControlMaster for the handle's socket
    pub fn master_start_spec(&self, handle: &ConnectionHandle) -> ProcessSpec {
        let target = handle.target();
        ProcessSpec::new("start SSH ControlMaster", &self.config.ssh_program)
            .args([
                "-nNf".to_string(),
                "-o".to_string(),
                "ControlMaster=yes".to_string(),
                "-o".to_string(),
                format!("ControlPath={}", handle.socket_path()),
                "-p".to_string(),
                target.port.to_string(),
                target.destination(),
            ])
            .detached_output()
    }

    /// Asks the ControlMaster behind the handle's socket to exit
    pub fn master_stop_spec(&self, handle: &ConnectionHandle) -> ProcessSpec {
        let target = handle.target();
        ProcessSpec::new("stop SSH ControlMaster", &self.config.ssh_program).args([
            "-O".to_string(),
            "exit".to_string(),
            "-S".to_string(),
            handle.socket_path(),
            "-p".to_string(),
            target.port.to_string(),
            target.destination(),
        ])
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Runs a process, turning a non-zero exit into an error
    pub async fn execute(&self, spec: ProcessSpec) -> Result<CommandOutput, ExecError> {
        debug!("{}: {}", spec.label, spec.command_line());

        let output = self.runner.run(&spec).await?;

        if !output.stdout.trim().is_empty() {
            debug!("{} stdout:\n{}", spec.label, output.stdout.trim_end());
        }
        if !output.stderr.trim().is_empty() {
            debug!("{} stderr:\n{}", spec.label, output.stderr.trim_end());
        }

        let output = output.into_result(&spec)?;
        info!("{} ({:.2?})", spec.label, output.elapsed);

        Ok(output)
    }

    pub async fn run_local(&self, label: &str, command: &str) -> Result<CommandOutput, ExecError> {
        self.execute(self.local_spec(label, command)).await
    }

    /// Runs a composed command on the target over the multiplexed connection
    pub async fn run_remote(
        &self,
        handle: &ConnectionHandle,
        label: &str,
        chain: &CommandChain,
    ) -> Result<CommandOutput, ExecError> {
        self.execute(self.remote_spec(handle, label, &chain.render()))
            .await
    }

    pub async fn transfer(
        &self,
        handle: &ConnectionHandle,
        label: &str,
        source: &Path,
        destination: &str,
    ) -> Result<CommandOutput, ExecError> {
        self.execute(self.transfer_spec(handle, label, source, destination))
            .await
    }
}
