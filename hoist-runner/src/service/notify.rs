//! Deploy notifications
//!
//! The pipeline's last step tells the team a deploy happened. Where the
//! message goes is behind the [`Notifier`] trait.

use async_trait::async_trait;
use hoist_client::CampfireClient;
use hoist_core::config::{CampfireConfig, ConfigError};
use std::time::Duration;
use tracing::{debug, info};

/// What gets announced after a deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySummary {
    pub environment: String,
    /// Name of the deployed project (the working directory's name)
    pub project: String,
    /// Local user who ran the deploy
    pub user: String,
    pub duration: Duration,
}

impl DeploySummary {
    /// Summary for the current user and working directory
    pub fn collect(environment: &str, duration: Duration) -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "someone".to_string());

        let project = std::env::current_dir()
            .ok()
            .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().to_string()))
            .unwrap_or_else(|| "project".to_string());

        Self {
            environment: environment.to_string(),
            project,
            user,
            duration,
        }
    }

    /// `<user> deployed <project> to <environment> in <duration>`
    pub fn message(&self) -> String {
        format!(
            "{} deployed {} to {} in {}",
            self.user,
            self.project,
            self.environment,
            format_duration(self.duration)
        )
    }
}

/// `42.3s` below a minute, `3m07s` above
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

/// Announces finished deploys
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary: &DeploySummary) -> anyhow::Result<()>;
}

/// Used when no notification service is configured
#[derive(Debug, Default, Clone)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, summary: &DeploySummary) -> anyhow::Result<()> {
        debug!("No notification configured: {}", summary.message());
        Ok(())
    }
}

/// Posts the summary to Campfire chat rooms
pub struct CampfireNotifier {
    client: CampfireClient,
    rooms: Vec<u64>,
}

impl CampfireNotifier {
    pub fn new(client: CampfireClient, rooms: Vec<u64>) -> Self {
        Self { client, rooms }
    }

    /// Builds the notifier from the `campfire` block of the configuration
    pub fn from_config(config: &CampfireConfig) -> Result<Self, ConfigError> {
        let rooms = config.room_ids()?;
        let client = CampfireClient::new(&config.account, &config.token);
        Ok(Self::new(client, rooms))
    }
}

#[async_trait]
impl Notifier for CampfireNotifier {
    async fn notify(&self, summary: &DeploySummary) -> anyhow::Result<()> {
        let message = summary.message();
        self.client.announce(&self.rooms, &message).await?;
        info!("Notified {} Campfire rooms", self.rooms.len());
        Ok(())
    }
}
