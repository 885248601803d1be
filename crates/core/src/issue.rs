// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work item types mirroring the external tracker's JSON contract.
//!
//! The core treats items as opaque beyond id, type, status, priority,
//! assignee, labels, and dependency edges. Everything else rides in the
//! free-text description (see [`crate::fields`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

crate::string_id! {
    /// Tracker item identifier (e.g. `gt-abc123`, `gt-mr-ab12cd`).
    pub struct BeadId;
}

impl BeadId {
    /// The numeric/alphanumeric tail after the last `-`, used by branch
    /// templates as `{issue}`.
    pub fn tail(&self) -> &str {
        self.0.rsplit('-').next().unwrap_or(&self.0)
    }
}

/// Work item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Task,
    Epic,
    Molecule,
    MergeRequest,
    AgentIdentity,
    RigIdentity,
    Convoy,
    Gate,
    Slot,
}

crate::simple_display! {
    IssueType {
        Task => "task",
        Epic => "epic",
        Molecule => "molecule",
        MergeRequest => "merge-request",
        AgentIdentity => "agent-identity",
        RigIdentity => "rig-identity",
        Convoy => "convoy",
        Gate => "gate",
        Slot => "slot",
    }
}

/// Work item status.
///
/// Closed items never re-open except explicitly by the refinery on merge
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Closed,
}

impl IssueStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, IssueStatus::Closed)
    }
}

crate::simple_display! {
    IssueStatus {
        Open => "open",
        InProgress => "in_progress",
        Closed => "closed",
    }
}

/// Priority 0..=4, 0 highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(0);
    pub const DEFAULT: Priority = Priority(2);
    pub const LOWEST: Priority = Priority(4);

    /// Clamp into the valid 0..=4 range.
    pub fn clamped(value: u8) -> Self {
        Priority(value.min(4))
    }

    /// One step more urgent (P2 → P1, floor P0). Used when the refinery
    /// creates conflict-resolution tasks.
    pub fn boosted(&self) -> Self {
        Priority(self.0.saturating_sub(1))
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracker work item as returned by `show`/`list` (JSON contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: BeadId,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub status: IssueStatus,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<BeadId>,
    /// Computed by the tracker: open deps that gate readiness.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<BeadId>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn default_priority() -> Priority {
    Priority::DEFAULT
}

impl WorkItem {
    /// Ready iff open and no open dependencies remain.
    ///
    /// The tracker's `ready` subcommand is authoritative; this mirrors it
    /// for in-memory checks against already-fetched items.
    pub fn is_ready(&self) -> bool {
        self.status == IssueStatus::Open && self.blocked_by.is_empty()
    }

    /// Field lookup in the description (`Key: value` lines).
    pub fn field(&self, key: &str) -> Option<&str> {
        crate::fields::get_field(&self.description, key)
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
