//! Hoist Runner
//!
//! The deployment pipeline: builds an application and its assets locally,
//! pushes them to the environment's server, switches the live release,
//! restarts the service and prunes old releases.
//!
//! Architecture:
//! - Configuration: process-level knobs (ssh/rsync/shell programs, control socket directory)
//! - Process boundary: every local or remote operation is one external process
//! - Connection: one multiplexed ssh channel per deploy, shared by every remote step
//! - Services: the individual pipeline steps (build, prepare, transfer, finalize, hook, retention, notify)
//! - Scheduler: the dependency graph driving the steps, plus unconditional teardown
//!
//! Nothing in this crate terminates the process. The caller inspects the
//! returned [`DeployReport`] and decides the exit code.

pub mod command;
pub mod config;
pub mod connection;
pub mod context;
pub mod process;
pub mod remote;
pub mod scheduler;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RunnerConfig;
pub use context::{DeployContext, DeployPlan};
pub use process::{CommandOutput, ExecError, ProcessRunner, ProcessSpec, TokioProcessRunner};
pub use scheduler::{DeployReport, Pipeline, Stage};
pub use service::{CampfireNotifier, DeploySummary, NoopNotifier, Notifier};
