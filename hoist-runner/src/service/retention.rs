//! Release retention
//!
//! Keeps the newest `keep_releases` release directories on the target and
//! deletes the rest. Anything unexpected in `releases/` stops retention
//! before a single directory is removed.

use hoist_core::domain::{ReleaseId, ReleaseIdError};
use thiserror::Error;
use tracing::{debug, info};

use crate::command::CommandChain;
use crate::context::DeployContext;
use crate::process::ExecError;

/// What retention found on the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Every release, oldest first
    pub releases: Vec<ReleaseId>,
    /// Releases to delete, oldest first
    pub expired: Vec<ReleaseId>,
}

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("releases directory contains an unexpected entry {entry:?}: {source}")]
    Corrupted {
        entry: String,
        #[source]
        source: ReleaseIdError,
    },

    #[error(
        "newest release on the server is {}, expected {expected}",
        newest.as_deref().unwrap_or("nothing")
    )]
    Mismatch {
        expected: ReleaseId,
        newest: Option<String>,
    },

    #[error("number of releases to keep must be at least 1")]
    InvalidKeep,

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Decides which releases to delete
///
/// # Arguments
/// * `entries` - Names found directly under `releases/`
/// * `current` - Release created by this run, must be the newest entry
/// * `keep` - Number of releases to keep, the current one included
pub fn plan_retention(
    entries: &[String],
    current: &ReleaseId,
    keep: usize,
) -> Result<RetentionPlan, RetentionError> {
    if keep == 0 {
        return Err(RetentionError::InvalidKeep);
    }

    let mut releases = entries
        .iter()
        .map(|entry| {
            entry
                .parse::<ReleaseId>()
                .map_err(|source| RetentionError::Corrupted {
                    entry: entry.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Fixed width, so lexicographic order is chronological order
    releases.sort();

    if releases.last() != Some(current) {
        return Err(RetentionError::Mismatch {
            expected: current.clone(),
            newest: releases.last().map(ToString::to_string),
        });
    }

    let excess = releases.len().saturating_sub(keep);
    let expired = releases[..excess].to_vec();

    Ok(RetentionPlan { releases, expired })
}

/// Composite command deleting the given releases
pub fn prune_chain(ctx: &DeployContext, expired: &[ReleaseId]) -> CommandChain {
    expired.iter().fold(CommandChain::new(), |chain, release| {
        chain.remove(&ctx.plan.environment.release_dir(release))
    })
}

/// Splits `ls -1A` output into directory names
///
/// Names are kept byte for byte so that stray whitespace fails validation
/// instead of naming a different directory.
fn listing_entries(stdout: &str) -> Vec<String> {
    if stdout.is_empty() {
        return Vec::new();
    }
    let stdout = stdout.strip_suffix('\n').unwrap_or(stdout);
    stdout.split('\n').map(ToString::to_string).collect()
}

/// Lists the releases on the target and deletes the expired ones
///
/// Returns the number of releases removed.
pub async fn prune_releases(ctx: &DeployContext) -> Result<usize, RetentionError> {
    let listing = CommandChain::new().then(format!(
        "ls -1A {}",
        ctx.plan.environment.releases_dir()
    ));
    let output = ctx
        .executor
        .run_remote(ctx.handle(), "list releases", &listing)
        .await?;

    let entries = listing_entries(&output.stdout);

    let plan = plan_retention(&entries, &ctx.plan.release, ctx.plan.keep_releases)?;
    debug!(
        "{} releases on the server, keeping {}",
        plan.releases.len(),
        ctx.plan.keep_releases
    );

    let chain = prune_chain(ctx, &plan.expired);
    if chain.is_empty() {
        info!("No old releases to remove");
        return Ok(0);
    }

    ctx.executor
        .run_remote(ctx.handle(), "prune releases", &chain)
        .await?;

    info!("Removed {} old releases", plan.expired.len());
    Ok(plan.expired.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, context, context_with};
    use std::sync::Arc;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn id(s: &str) -> ReleaseId {
        s.parse().unwrap()
    }

    const LISTING: [&str; 3] = ["20240101000000", "20240102000000", "20240103000000"];

    #[test]
    fn test_keep_two_deletes_oldest() {
        let plan = plan_retention(&names(&LISTING), &id("20240103000000"), 2).unwrap();
        assert_eq!(plan.expired, vec![id("20240101000000")]);
        assert_eq!(plan.releases.len(), 3);
    }

    #[test]
    fn test_keep_three_or_more_deletes_nothing() {
        for keep in [3, 4, 10] {
            let plan = plan_retention(&names(&LISTING), &id("20240103000000"), keep).unwrap();
            assert!(plan.expired.is_empty());
        }
    }

    #[test]
    fn test_unsorted_listing() {
        let listing = names(&["20240103000000", "20240101000000", "20240102000000"]);
        let plan = plan_retention(&listing, &id("20240103000000"), 1).unwrap();
        assert_eq!(plan.expired, vec![id("20240101000000"), id("20240102000000")]);
    }

    #[test]
    fn test_mismatch_aborts() {
        let err = plan_retention(&names(&LISTING), &id("20240102000000"), 2).unwrap_err();
        assert!(matches!(err, RetentionError::Mismatch { .. }));
        assert!(err.to_string().contains("20240103000000"));
    }

    #[test]
    fn test_missing_current_release_aborts() {
        let err = plan_retention(&[], &id("20240103000000"), 2).unwrap_err();
        assert!(matches!(err, RetentionError::Mismatch { newest: None, .. }));
    }

    #[test]
    fn test_corrupted_entries_abort() {
        for bad in ["abc", "2024010100000", "202401010000000", "2024010100000x"] {
            let mut listing = names(&LISTING);
            listing.insert(1, bad.to_string());

            let err = plan_retention(&listing, &id("20240103000000"), 1).unwrap_err();
            match err {
                RetentionError::Corrupted { entry, .. } => assert_eq!(entry, bad),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_zero_keep_rejected() {
        let err = plan_retention(&names(&LISTING), &id("20240103000000"), 0).unwrap_err();
        assert!(matches!(err, RetentionError::InvalidKeep));
    }

    #[test]
    fn test_second_pass_deletes_nothing() {
        let current = id("20240103000000");
        let first = plan_retention(&names(&LISTING), &current, 2).unwrap();

        let remaining: Vec<String> = first
            .releases
            .iter()
            .filter(|release| !first.expired.contains(release))
            .map(ToString::to_string)
            .collect();

        let second = plan_retention(&remaining, &current, 2).unwrap();
        assert!(second.expired.is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_expired_in_one_command() {
        let runner = Arc::new(FakeRunner::new().stdout(
            "list releases",
            "20240101000000\n20240102000000\n20240103000000\n",
        ));
        let (ctx, _dir) = context_with(runner.clone(), &["make"], &[], |plan| {
            plan.keep_releases = 1;
        });

        let removed = prune_releases(&ctx).await.unwrap();
        assert_eq!(removed, 2);

        let prune = runner.spec("prune releases").unwrap();
        assert_eq!(
            prune.args.last().map(String::as_str),
            Some("rm -rf /srv/app/releases/20240101000000 && rm -rf /srv/app/releases/20240102000000")
        );
    }

    #[tokio::test]
    async fn test_prune_with_corrupted_listing_deletes_nothing() {
        let runner = Arc::new(
            FakeRunner::new().stdout("list releases", "20240101000000\nabc\n20240103000000\n"),
        );
        let (ctx, _dir) = context(runner.clone(), &["make"], &[]);

        let err = prune_releases(&ctx).await.unwrap_err();
        assert!(matches!(err, RetentionError::Corrupted { .. }));
        assert_eq!(runner.count("prune releases"), 0);
    }

    #[test]
    fn test_listing_entries_keep_whitespace() {
        assert!(listing_entries("").is_empty());
        assert_eq!(
            listing_entries(" 20240101000000\n20240102000000 \n"),
            names(&[" 20240101000000", "20240102000000 "])
        );
        assert_eq!(listing_entries("a\n\nb"), names(&["a", "", "b"]));
    }

    #[tokio::test]
    async fn test_prune_with_padded_entry_deletes_nothing() {
        let runner = Arc::new(FakeRunner::new().stdout(
            "list releases",
            " 20240101000000\n20240102000000\n20240103000000\n",
        ));
        let (ctx, _dir) = context_with(runner.clone(), &["make"], &[], |plan| {
            plan.keep_releases = 1;
        });

        let err = prune_releases(&ctx).await.unwrap_err();
        assert!(matches!(err, RetentionError::Corrupted { .. }));
        assert_eq!(runner.count("prune releases"), 0);
    }

    #[tokio::test]
    async fn test_prune_within_limit() {
        let runner = Arc::new(FakeRunner::new().stdout("list releases", "20240103000000\n"));
        let (ctx, _dir) = context(runner.clone(), &["make"], &[]);

        assert_eq!(prune_releases(&ctx).await.unwrap(), 0);
        assert_eq!(runner.labels(), vec!["list releases"]);
    }
}
