//! Test doubles and fixtures

use async_trait::async_trait;
use hoist_core::domain::{Environment, Target};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::config::RunnerConfig;
use crate::context::{DeployContext, DeployPlan};
use crate::process::{CommandOutput, ExecError, ProcessRunner, ProcessSpec};
use crate::service::{DeploySummary, Notifier};

#[derive(Debug, Clone, Default)]
struct Behaviour {
    fail: bool,
    delay: Option<Duration>,
    stdout: Option<String>,
}

/// Start or completion of a fake process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Started(String),
    Finished(String, bool),
}

/// Recording [`ProcessRunner`] keyed by process label
#[derive(Default)]
pub struct FakeRunner {
    behaviours: HashMap<String, Behaviour>,
    specs: Mutex<Vec<ProcessSpec>>,
    events: Mutex<Vec<RunEvent>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every process with this label exit with code 1
    pub fn fail(mut self, label: &str) -> Self {
        self.behaviours.entry(label.to_string()).or_default().fail = true;
        self
    }

    pub fn delay(mut self, label: &str, delay: Duration) -> Self {
        self.behaviours.entry(label.to_string()).or_default().delay = Some(delay);
        self
    }

    pub fn stdout(mut self, label: &str, stdout: &str) -> Self {
        self.behaviours.entry(label.to_string()).or_default().stdout = Some(stdout.to_string());
        self
    }

    /// Labels in start order
    pub fn labels(&self) -> Vec<String> {
        self.specs().into_iter().map(|spec| spec.label).collect()
    }

    pub fn specs(&self) -> Vec<ProcessSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn spec(&self, label: &str) -> Option<ProcessSpec> {
        self.specs().into_iter().find(|spec| spec.label == label)
    }

    pub fn count(&self, label: &str) -> usize {
        self.specs().iter().filter(|spec| spec.label == label).count()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Position of the first start of `label` in the event log
    pub fn started_at(&self, label: &str) -> Option<usize> {
        self.events()
            .iter()
            .position(|event| matches!(event, RunEvent::Started(l) if l == label))
    }

    /// Position of the first successful completion of `label` in the event log
    pub fn succeeded_at(&self, label: &str) -> Option<usize> {
        self.events()
            .iter()
            .position(|event| matches!(event, RunEvent::Finished(l, true) if l == label))
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<CommandOutput, ExecError> {
        self.specs.lock().unwrap().push(spec.clone());
        self.events
            .lock()
            .unwrap()
            .push(RunEvent::Started(spec.label.clone()));

        let behaviour = self.behaviours.get(&spec.label).cloned().unwrap_or_default();

        if let Some(delay) = behaviour.delay {
            tokio::time::sleep(delay).await;
        }

        let output = if behaviour.fail {
            CommandOutput::failed(1, format!("{} failed", spec.label))
        } else {
            CommandOutput::ok(behaviour.stdout.unwrap_or_default())
        };

        self.events
            .lock()
            .unwrap()
            .push(RunEvent::Finished(spec.label.clone(), output.success));

        Ok(output)
    }
}

/// Notifier that remembers what it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    sent: Mutex<Vec<DeploySummary>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<DeploySummary> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, summary: &DeploySummary) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(summary.clone());
        if self.fail {
            anyhow::bail!("notification service unavailable");
        }
        Ok(())
    }
}

/// Plan for `deploy@example.com:22` deploying into `/srv/app`
pub fn plan(app: &[&str], assets: &[&str]) -> DeployPlan {
    DeployPlan {
        environment: Environment {
            name: "staging".to_string(),
            target: Target::new("example.com", "deploy", 22),
            deploy_root: "/srv/app".to_string(),
            restart_command: Some("sudo restart app".to_string()),
            after_deploy_command: None,
            after_deploy_remote_command: None,
        },
        release: "20240103000000".parse().unwrap(),
        app_build_commands: app.iter().map(|c| c.to_string()).collect(),
        asset_build_commands: assets.iter().map(|c| c.to_string()).collect(),
        built_app_dir: PathBuf::from("dist"),
        built_assets_dir: PathBuf::from("public/assets"),
        keep_releases: 5,
    }
}

/// Context over a fake runner; the control directory lives as long as the returned guard
pub fn context(
    runner: Arc<FakeRunner>,
    app: &[&str],
    assets: &[&str],
) -> (Arc<DeployContext>, TempDir) {
    context_with(runner, app, assets, |_| {})
}

pub fn context_with(
    runner: Arc<FakeRunner>,
    app: &[&str],
    assets: &[&str],
    customize: impl FnOnce(&mut DeployPlan),
) -> (Arc<DeployContext>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut plan = plan(app, assets);
    customize(&mut plan);

    let ctx = DeployContext::new(plan, runner, RunnerConfig::new(dir.path()));
    (ctx, dir)
}
