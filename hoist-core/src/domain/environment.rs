//! Environment domain types
//!
//! An environment is what the user names on the command line ("staging",
//! "production"). It owns the remote directory layout every pipeline step
//! works against:
//!
//! ```text
//! <deploy_root>/
//!   current -> releases/<id>
//!   releases/<id>/...
//!   shared/{log,pids,system,assets,<app payload>}
//! ```

use serde::{Deserialize, Serialize};

use super::release::ReleaseId;
use super::target::Target;

/// A resolved, validated deploy environment
///
/// Exactly one target per environment. Built once from configuration and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub target: Target,
    pub deploy_root: String,
    pub restart_command: Option<String>,
    /// Runs locally after the new release is live
    pub after_deploy_command: Option<String>,
    /// Runs on the target, inside the new release, after it is live
    pub after_deploy_remote_command: Option<String>,
}

impl Environment {
    /// `<deploy_root>/releases`
    pub fn releases_dir(&self) -> String {
        join(&self.deploy_root, "releases")
    }

    /// `<deploy_root>/releases/<id>`
    pub fn release_dir(&self, release: &ReleaseId) -> String {
        join(&self.releases_dir(), release.as_str())
    }

    /// `<deploy_root>/current`
    pub fn current_link(&self) -> String {
        join(&self.deploy_root, "current")
    }

    /// `<deploy_root>/shared`
    pub fn shared_dir(&self) -> String {
        join(&self.deploy_root, "shared")
    }

    /// `<deploy_root>/shared/<name>`
    pub fn shared_path(&self, name: &str) -> String {
        join(&self.shared_dir(), name)
    }

    pub fn has_after_hook(&self) -> bool {
        self.after_deploy_command.is_some() || self.after_deploy_remote_command.is_some()
    }
}

/// Joins two remote path segments with exactly one `/`
pub fn join(base: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}
