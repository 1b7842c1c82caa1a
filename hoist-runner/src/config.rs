//! Runner configuration
//!
//! Process-level settings that are not part of a project's `hoist.json`:
//! which external programs to invoke and where the multiplexed connection
//! keeps its control socket.

use std::path::PathBuf;

/// Runner configuration
///
/// Defaults suit a stock Unix workstation. Every field can be overridden
/// from the environment, which is mostly useful for wrappers and CI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// ssh client binary
    pub ssh_program: String,

    /// rsync binary
    pub rsync_program: String,

    /// Shell used for build commands and local hooks (invoked as `<shell> -c <command>`)
    pub shell: String,

    /// Directory holding control sockets, one per `user@host:port`
    ///
    /// Unix socket paths are limited to roughly 100 bytes, so keep this short.
    pub control_dir: PathBuf,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new(control_dir: impl Into<PathBuf>) -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            rsync_program: "rsync".to_string(),
            shell: "/bin/sh".to_string(),
            control_dir: control_dir.into(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognised environment variables (all optional):
    /// - HOIST_SSH (default: ssh)
    /// - HOIST_RSYNC (default: rsync)
    /// - HOIST_SHELL (default: /bin/sh)
    /// - HOIST_CONTROL_DIR (default: `$TMPDIR/hoist`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RunnerConfig::from_env`] with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ssh) = lookup("HOIST_SSH") {
            config.ssh_program = ssh;
        }

        if let Some(rsync) = lookup("HOIST_RSYNC") {
            config.rsync_program = rsync;
        }

        if let Some(shell) = lookup("HOIST_SHELL") {
            config.shell = shell;
        }

        if let Some(dir) = lookup("HOIST_CONTROL_DIR") {
            config.control_dir = PathBuf::from(dir);
        }

        config
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ssh_program.trim().is_empty() {
            anyhow::bail!("ssh program cannot be empty");
        }

        if self.rsync_program.trim().is_empty() {
            anyhow::bail!("rsync program cannot be empty");
        }

        if self.shell.trim().is_empty() {
            anyhow::bail!("shell cannot be empty");
        }

        if self.control_dir.as_os_str().is_empty() {
            anyhow::bail!("control socket directory cannot be empty");
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("hoist"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.ssh_program, "ssh");
        assert_eq!(config.rsync_program, "rsync");
        assert_eq!(config.shell, "/bin/sh");
        assert!(config.control_dir.ends_with("hoist"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HOIST_SSH", "/usr/local/bin/ssh"),
            ("HOIST_CONTROL_DIR", "/run/hoist"),
        ]
        .into_iter()
        .collect();

        let config = RunnerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.ssh_program, "/usr/local/bin/ssh");
        assert_eq!(config.rsync_program, "rsync");
        assert_eq!(config.control_dir, PathBuf::from("/run/hoist"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = RunnerConfig::default();
        assert!(config.validate().is_ok());

        config.ssh_program = " ".to_string();
        assert!(config.validate().is_err());

        config.ssh_program = "ssh".to_string();
        config.control_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
