//! Process boundary
//!
//! Every local build, remote command and file transfer is one external
//! process. [`ProcessRunner`] is the seam between the pipeline and the
//! operating system so the whole pipeline can run against a fake.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

/// One external process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Human readable name of the operation, used in logs and reports
    pub label: String,
    pub program: String,
    pub args: Vec<String>,

    /// Capture stdout/stderr (default). When false stdout is discarded and
    /// stderr goes to the terminal, needed for commands that fork into the
    /// background and would otherwise hold the pipes open.
    pub capture_output: bool,
}

impl ProcessSpec {
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            capture_output: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn detached_output(mut self) -> Self {
        self.capture_output = false;
        self
    }

    /// Full command line, for display only (no quoting)
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// None when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
            elapsed: Duration::ZERO,
        }
    }

    /// Converts a non-zero exit into [`ExecError::CommandFailed`]
    pub fn into_result(self, spec: &ProcessSpec) -> Result<CommandOutput, ExecError> {
        if self.success {
            return Ok(self);
        }

        Err(ExecError::CommandFailed {
            label: spec.label.clone(),
            command: spec.command_line(),
            exit_code: self.exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
            elapsed: self.elapsed,
        })
    }
}

/// Errors raised at the process boundary
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{label}: failed to start `{command}`: {source}")]
    Spawn {
        label: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{label} failed ({}) after {elapsed:.2?}\ncommand: {command}{}",
        ExitStatusDisplay(*exit_code),
        OutputDisplay { stdout, stderr }
    )]
    CommandFailed {
        label: String,
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        elapsed: Duration,
    },

    #[error("{label} was interrupted: {reason}")]
    Interrupted { label: String, reason: String },
}

impl ExecError {
    /// Label of the operation that failed
    pub fn label(&self) -> &str {
        match self {
            ExecError::Spawn { label, .. }
            | ExecError::CommandFailed { label, .. }
            | ExecError::Interrupted { label, .. } => label,
        }
    }
}

struct ExitStatusDisplay(Option<i32>);

impl fmt::Display for ExitStatusDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

struct OutputDisplay<'a> {
    stdout: &'a str,
    stderr: &'a str,
}

impl fmt::Display for OutputDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();

        if !stdout.is_empty() {
            write!(f, "\nstdout:\n{}", stdout)?;
        }
        if !stderr.is_empty() {
            write!(f, "\nstderr:\n{}", stderr)?;
        }
        Ok(())
    }
}

/// Executes process specs
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs the process to completion
    ///
    /// Returns the output whatever the exit code is; only a failure to
    /// start (or wait for) the process is an error here.
    async fn run(&self, spec: &ProcessSpec) -> Result<CommandOutput, ExecError>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<CommandOutput, ExecError> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).stdin(Stdio::null());

        if spec.capture_output {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::inherit());
        }

        let spawn_error = |source| ExecError::Spawn {
            label: spec.label.clone(),
            command: spec.command_line(),
            source,
        };

        let started = Instant::now();
        let output = command.output().await.map_err(spawn_error)?;

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let spec = ProcessSpec::new("list", "ls").args(["-1", "/tmp"]);
        assert_eq!(spec.command_line(), "ls -1 /tmp");
        assert!(spec.capture_output);
        assert!(!spec.clone().detached_output().capture_output);
    }

    #[test]
    fn test_failed_output_becomes_error() {
        let spec = ProcessSpec::new("prepare server", "ssh").arg("mkdir -p /srv/app");
        let output = CommandOutput {
            stdout: "partial".to_string(),
            ..CommandOutput::failed(2, "permission denied")
        };

        let err = output.into_result(&spec).unwrap_err();
        assert_eq!(err.label(), "prepare server");

        let message = err.to_string();
        assert!(message.contains("prepare server failed (exit code 2)"));
        assert!(message.contains("command: ssh mkdir -p /srv/app"));
        assert!(message.contains("stdout:\npartial"));
        assert!(message.contains("stderr:\npermission denied"));
    }

    #[test]
    fn test_successful_output_passes_through() {
        let spec = ProcessSpec::new("noop", "true");
        let output = CommandOutput::ok("done").into_result(&spec).unwrap();
        assert_eq!(output.stdout, "done");
    }

    #[tokio::test]
    async fn test_tokio_runner_captures_output() {
        let runner = TokioProcessRunner::new();
        let spec = ProcessSpec::new("echo", "/bin/sh").args(["-c", "echo hello; exit 3"]);

        let output = runner.run(&spec).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_tokio_runner_spawn_failure() {
        let runner = TokioProcessRunner::new();
        let spec = ProcessSpec::new("missing", "/nonexistent/hoist-test-binary");

        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
