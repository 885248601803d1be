// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git-safety audit and the nuke decision tree.
//!
//! A worker may only be torn down when its work is provably safe:
//! either its own `cleanup_status` says clean, or its HEAD is already an
//! ancestor of a default branch. Everything else blocks the nuke.

use gt_adapters::git::GitAdapter;
use gt_core::polecat::CleanupStatus;
use std::path::Path;
use tracing::warn;

/// Why a nuke was allowed or refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NukeDecision {
    /// Safe to tear down.
    Nuke,
    /// Refused: the named cleanup status reports work at risk.
    SkipDirty(CleanupStatus),
    /// Refused: status unknown and HEAD is not on any default branch.
    SkipUnverified,
}

/// True iff the worker's HEAD is an ancestor of any `<remote>/<default>`
/// branch, or of the local default branch.
///
/// The local fallback can mask a miswired default branch; the source
/// tolerates this deliberately, so we do too.
pub async fn verify_commit_on_main(git: &dyn GitAdapter, worker_clone: &Path) -> bool {
    let head = match git.rev_parse(worker_clone, "HEAD").await {
        Ok(head) => head,
        Err(err) => {
            warn!(error = %err, "rev-parse HEAD failed during audit");
            return false;
        }
    };
    let default = match git.default_branch(worker_clone).await {
        Ok(default) => default,
        Err(_) => "main".to_string(),
    };

    let remotes = git.remotes(worker_clone).await.unwrap_or_default();
    for remote in &remotes {
        if let Err(err) = git.fetch(worker_clone, remote).await {
            warn!(remote, error = %err, "fetch failed during audit");
        }
        let remote_ref = format!("{remote}/{default}");
        if let Ok(true) = git.is_ancestor(worker_clone, &head, &remote_ref).await {
            return true;
        }
    }

    // Fall through to the local default branch
    matches!(git.is_ancestor(worker_clone, &head, &default).await, Ok(true))
}

/// The auto-nuke decision tree:
/// clean → nuke; any `has_*` → skip with reason; unknown → fall back to
/// the git audit.
pub async fn auto_nuke_decision(
    status: CleanupStatus,
    git: &dyn GitAdapter,
    worker_clone: &Path,
) -> NukeDecision {
    match status {
        CleanupStatus::Clean => NukeDecision::Nuke,
        status if status.work_at_risk() => NukeDecision::SkipDirty(status),
        _ => {
            if verify_commit_on_main(git, worker_clone).await {
                NukeDecision::Nuke
            } else {
                NukeDecision::SkipUnverified
            }
        }
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
