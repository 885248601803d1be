// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Convoy observer.
//!
//! When a work item closes, every open convoy tracking it gets
//! re-checked so rollups close as their children complete. Multiple
//! observers (witness, refinery, daemon) may race; the check is
//! idempotent and tolerates re-entry.

use gt_adapters::tracker::{DepDirection, TrackerAdapter, TrackerError};
use gt_core::issue::{BeadId, IssueStatus, IssueType};
use std::sync::Arc;
use tracing::{info, warn};

/// Re-check dependency rollups for every open convoy tracking `issue`.
///
/// Returns the convoys that were closed by this pass.
pub async fn check_convoys_for_issue(
    tracker: Arc<dyn TrackerAdapter>,
    issue: &BeadId,
    observer: &str,
) -> Result<Vec<BeadId>, TrackerError> {
    // Convoys track issues with direction=up, type=tracks edges
    let convoys = tracker
        .dep_list(issue, DepDirection::Up, Some("tracks"))
        .await?;

    let mut closed = Vec::new();
    for convoy in convoys {
        if convoy.issue_type != IssueType::Convoy || convoy.status.is_closed() {
            continue;
        }
        match check_one(tracker.as_ref(), &convoy.id, observer).await {
            Ok(true) => closed.push(convoy.id),
            Ok(false) => {}
            Err(err) => {
                // One poisoned convoy never stalls the rest
                warn!(convoy = %convoy.id, error = %err, "convoy check failed");
            }
        }
    }
    Ok(closed)
}

/// Close the convoy iff every tracked child is closed. Returns whether
/// it closed.
async fn check_one(
    tracker: &dyn TrackerAdapter,
    convoy: &BeadId,
    observer: &str,
) -> Result<bool, TrackerError> {
    let children = tracker
        .dep_list(convoy, DepDirection::Down, Some("tracks"))
        .await?;
    if children.is_empty() {
        return Ok(false);
    }
    if children.iter().all(|c| c.status == IssueStatus::Closed) {
        tracker
            .close(convoy, Some(&format!("all children closed (observed by {observer})")))
            .await?;
        info!(convoy = %convoy, observer, "convoy closed");
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
#[path = "convoy_tests.rs"]
mod tests;
