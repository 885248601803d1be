// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge-request description fields.
//!
//! A merge request is a tracker item of type `merge-request`; its
//! structured payload rides in `Key: value` description lines. Rendering
//! and parsing must round-trip without disturbing prose or unknown lines.

use crate::fields::{get_field, set_field};
use crate::issue::BeadId;
use serde::{Deserialize, Serialize};

/// Structured fields of a merge-request description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestFields {
    pub branch: Option<String>,
    pub target: Option<String>,
    pub source_issue: Option<BeadId>,
    pub worker: Option<String>,
    pub rig: Option<String>,
    pub agent_bead: Option<BeadId>,
    pub retry_count: u32,
    pub convoy_id: Option<BeadId>,
    pub convoy_created_at: Option<String>,
    pub merge_commit: Option<String>,
    pub close_reason: Option<String>,
}

impl MergeRequestFields {
    /// Parse from a description. Missing fields stay None; a malformed
    /// Retry-Count reads as 0.
    pub fn from_description(description: &str) -> Self {
        let field = |key: &str| get_field(description, key).map(str::to_string);
        Self {
            branch: field("Branch"),
            target: field("Target"),
            source_issue: field("Source-Issue").map(BeadId::new),
            worker: field("Worker"),
            rig: field("Rig"),
            agent_bead: field("Agent-Bead").map(BeadId::new),
            retry_count: get_field(description, "Retry-Count")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            convoy_id: field("Convoy-Id").map(BeadId::new),
            convoy_created_at: field("Convoy-Created-At"),
            merge_commit: field("Merge-Commit"),
            close_reason: field("Close-Reason"),
        }
    }

    /// Write the set fields back into `description`, updating existing
    /// lines in place and appending new ones. Fields that are None are
    /// left untouched (never deleted).
    pub fn apply_to(&self, description: &str) -> String {
        let mut out = description.to_string();
        let mut put = |key: &str, value: Option<&str>| {
            if let Some(v) = value {
                out = set_field(&out, key, v);
            }
        };
        put("Branch", self.branch.as_deref());
        put("Target", self.target.as_deref());
        put("Source-Issue", self.source_issue.as_ref().map(|b| b.as_str()));
        put("Worker", self.worker.as_deref());
        put("Rig", self.rig.as_deref());
        put("Agent-Bead", self.agent_bead.as_ref().map(|b| b.as_str()));
        put("Convoy-Id", self.convoy_id.as_ref().map(|b| b.as_str()));
        put("Convoy-Created-At", self.convoy_created_at.as_deref());
        put("Merge-Commit", self.merge_commit.as_deref());
        put("Close-Reason", self.close_reason.as_deref());
        set_field(&out, "Retry-Count", &self.retry_count.to_string())
    }

    /// Render a fresh description from scratch, with an optional leading
    /// prose paragraph.
    pub fn render(&self, prose: &str) -> String {
        let mut out = String::new();
        if !prose.is_empty() {
            out.push_str(prose.trim_end());
            out.push_str("\n\n");
        }
        self.apply_to(&out)
    }
}

#[cfg(test)]
#[path = "merge_request_tests.rs"]
mod tests;
