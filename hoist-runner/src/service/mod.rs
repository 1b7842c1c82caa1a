//! Pipeline steps
//!
//! Each step is an async operation over the shared [`DeployContext`]; the
//! composite remote commands are built by pure functions so they can be
//! checked without a server.
//!
//! [`DeployContext`]: crate::context::DeployContext

pub mod build;
pub mod finalize;
pub mod hook;
pub mod notify;
pub mod prepare;
pub mod retention;
pub mod transfer;

pub use build::run_builds;
pub use finalize::{finalize_chain, finalize_release};
pub use hook::run_after_hooks;
pub use prepare::{prepare_chain, prepare_server};
pub use retention::{RetentionError, RetentionPlan, plan_retention, prune_releases};
pub use transfer::{upload_app, upload_assets};

// Notification seam
pub use notify::{CampfireNotifier, DeploySummary, NoopNotifier, Notifier};
