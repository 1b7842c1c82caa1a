//! Multiplexed ssh connection
//!
//! One ControlMaster per deploy, keyed by `user@host:port`. Every remote
//! command and rsync transfer of the run reuses its control socket.

use anyhow::{Context, Result};
use hoist_core::domain::Target;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::process::ExecError;
use crate::remote::RemoteExecutor;

/// Size of `sun_path` on macOS, the smallest of the platforms we run on
const SUN_PATH_LEN: usize = 104;

/// ssh binds the master at `<ControlPath>.<random>` before renaming it into place
const CONTROL_PATH_SUFFIX: usize = 17;

/// Longest ControlPath that still fits `sun_path` with its NUL terminator
/// once ssh appends its temporary suffix
pub const MAX_SOCKET_PATH: usize = SUN_PATH_LEN - 1 - CONTROL_PATH_SUFFIX;

/// Identifies the multiplexed channel to a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    target: Target,
    socket: PathBuf,
}

impl ConnectionHandle {
    /// Creates a handle whose control socket lives in `control_dir`
    pub fn new(target: Target, control_dir: &Path) -> Self {
        let socket = control_dir.join(target.identity());
        Self { target, socket }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn socket_path(&self) -> String {
        self.socket.to_string_lossy().to_string()
    }

    /// Rejects control sockets ssh could not bind
    pub fn check_socket_path(&self) -> Result<()> {
        let socket_path = self.socket_path();
        if socket_path.len() > MAX_SOCKET_PATH {
            anyhow::bail!(
                "control socket path {} is longer than {} bytes, set HOIST_CONTROL_DIR to a shorter directory",
                socket_path,
                MAX_SOCKET_PATH
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Idle,
    Open,
    Closed,
}

/// Owns the lifecycle of the ControlMaster
///
/// `open` is called by the connect task, `close` once by the scheduler after
/// every other task has settled. Tasks in between only read the handle.
pub struct ConnectionMultiplexer {
    handle: ConnectionHandle,
    executor: Arc<RemoteExecutor>,
    state: Mutex<ConnectionState>,
}

impl ConnectionMultiplexer {
    pub fn new(target: Target, executor: Arc<RemoteExecutor>) -> Self {
        let handle = ConnectionHandle::new(target, &executor.config().control_dir);
        Self {
            handle,
            executor,
            state: Mutex::new(ConnectionState::Idle),
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self) -> bool {
        *self.state() == ConnectionState::Open
    }

    /// Starts the ControlMaster
    ///
    /// Returns once ssh has authenticated and forked into the background.
    pub async fn open(&self) -> Result<()> {
        if *self.state() != ConnectionState::Idle {
            anyhow::bail!("connection to {} was already opened", self.handle.target());
        }

        self.handle.check_socket_path()?;

        let control_dir = &self.executor.config().control_dir;
        tokio::fs::create_dir_all(control_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create control socket directory {}",
                    control_dir.display()
                )
            })?;

        info!("Connecting to {}", self.handle.target());
        self.executor
            .execute(self.executor.master_start_spec(&self.handle))
            .await?;

        *self.state() = ConnectionState::Open;
        debug!("Control socket ready at {}", self.handle.socket_path());

        Ok(())
    }

    /// Stops the ControlMaster
    ///
    /// The exit request is sent even if `open` failed or never ran: a master
    /// may have come up after ssh reported an error. Calling it again after
    /// that is a no-op.
    pub async fn close(&self) -> Result<(), ExecError> {
        {
            let mut state = self.state();
            if *state == ConnectionState::Closed {
                return Ok(());
            }
            *state = ConnectionState::Closed;
        }

        info!("Disconnecting from {}", self.handle.target());
        self.executor
            .execute(self.executor.master_stop_spec(&self.handle))
            .await
            .map(|_| ())
    }
}

impl Drop for ConnectionMultiplexer {
    fn drop(&mut self) {
        if self.is_open() {
            warn!(
                "Connection to {} dropped without being closed, control socket {} may be left behind",
                self.handle.target(),
                self.handle.socket_path()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use crate::testing::FakeRunner;

    fn multiplexer(runner: Arc<FakeRunner>, control_dir: &Path) -> ConnectionMultiplexer {
        let executor = Arc::new(RemoteExecutor::new(runner, RunnerConfig::new(control_dir)));
        ConnectionMultiplexer::new(Target::new("example.com", "deploy", 22), executor)
    }

    #[test]
    fn test_handle_socket_named_by_identity() {
        let handle = ConnectionHandle::new(
            Target::new("example.com", "deploy", 22),
            Path::new("/tmp/hoist"),
        );
        assert_eq!(handle.socket_path(), "/tmp/hoist/deploy@example.com:22");
    }

    #[test]
    fn test_socket_path_limit_leaves_room_for_ssh_suffix() {
        assert_eq!(MAX_SOCKET_PATH, 86);

        let target = Target::new("example.com", "deploy", 22);
        // "/" plus "deploy@example.com:22"
        let name_len = 1 + target.identity().len();
        let dir_at = |len: usize| PathBuf::from(format!("/{}", "d".repeat(len - 1)));

        let fits = ConnectionHandle::new(target.clone(), &dir_at(MAX_SOCKET_PATH - name_len));
        assert_eq!(fits.socket_path().len(), MAX_SOCKET_PATH);
        assert!(fits.check_socket_path().is_ok());

        let too_long = ConnectionHandle::new(target, &dir_at(MAX_SOCKET_PATH - name_len + 1));
        assert_eq!(too_long.socket_path().len(), MAX_SOCKET_PATH + 1);
        assert!(too_long.check_socket_path().is_err());
    }

    #[tokio::test]
    async fn test_open_then_close() {
        let dir = tempfile::tempdir().unwrap();
        let control_dir = dir.path().join("sockets");
        let runner = Arc::new(FakeRunner::new());
        let connection = multiplexer(runner.clone(), &control_dir);

        connection.open().await.unwrap();
        assert!(connection.is_open());
        assert!(control_dir.is_dir());

        connection.close().await.unwrap();
        connection.close().await.unwrap();
        assert!(!connection.is_open());

        assert_eq!(
            runner.labels(),
            vec!["start SSH ControlMaster", "stop SSH ControlMaster"]
        );
    }

    #[tokio::test]
    async fn test_close_after_failed_open() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new().fail("start SSH ControlMaster"));
        let connection = multiplexer(runner.clone(), dir.path());

        assert!(connection.open().await.is_err());
        assert!(!connection.is_open());

        connection.close().await.unwrap();
        assert_eq!(runner.count("stop SSH ControlMaster"), 1);
    }

    #[tokio::test]
    async fn test_open_rejects_long_socket_path() {
        let long_dir = PathBuf::from("/tmp").join("x".repeat(MAX_SOCKET_PATH));
        let runner = Arc::new(FakeRunner::new());
        let connection = multiplexer(runner.clone(), &long_dir);

        let err = connection.open().await.unwrap_err();
        assert!(err.to_string().contains("HOIST_CONTROL_DIR"));
        assert!(runner.labels().is_empty());
    }
}
