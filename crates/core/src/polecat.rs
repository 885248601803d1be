// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polecat (worker) entity.
//!
//! A polecat is a persistent worker identity: a pool name, an isolated
//! git worktree, and a work branch. The tmux session running inside it is
//! transient; identity outlives sessions.

use crate::issue::BeadId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::string_id! {
    /// Worker name drawn from the rig's themed name pool.
    pub struct PolecatName;
}

crate::string_id! {
    /// Rig (host workspace) name.
    pub struct RigName;
}

crate::string_id! {
    /// Terminal multiplexer session identifier.
    pub struct SessionId;
}

/// Lifecycle state, derived from the tracker's agent-identity item;
/// never stored on the polecat itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolecatState {
    Working,
    Done,
    Stuck,
}

impl PolecatState {
    /// Parse a tracker state string. The legacy value `active` is kept
    /// for backward compatibility and treated as Working. Unknown values
    /// default to Working (assume the worker is alive).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "done" => PolecatState::Done,
            "stuck" => PolecatState::Stuck,
            _ => PolecatState::Working,
        }
    }
}

crate::simple_display! {
    PolecatState {
        Working => "working",
        Done => "done",
        Stuck => "stuck",
    }
}

/// Git cleanliness of a worker's clone, as reported by the worker into
/// its agent-identity item (`cleanup_status: ...` description line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    Clean,
    HasUncommitted,
    HasStash,
    HasUnpushed,
    /// Missing or unparsable line.
    Unknown,
}

impl CleanupStatus {
    /// Parse the `cleanup_status` field value. Anything unrecognized is
    /// Unknown, never an error; the witness treats unknown as "audit
    /// git state before acting".
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("clean") => CleanupStatus::Clean,
            Some("has_uncommitted") => CleanupStatus::HasUncommitted,
            Some("has_stash") => CleanupStatus::HasStash,
            Some("has_unpushed") => CleanupStatus::HasUnpushed,
            _ => CleanupStatus::Unknown,
        }
    }

    /// True for every `has_*` value: work would be lost by a nuke.
    pub fn work_at_risk(&self) -> bool {
        matches!(
            self,
            CleanupStatus::HasUncommitted | CleanupStatus::HasStash | CleanupStatus::HasUnpushed
        )
    }
}

crate::simple_display! {
    CleanupStatus {
        Clean => "clean",
        HasUncommitted => "has_uncommitted",
        HasStash => "has_stash",
        HasUnpushed => "has_unpushed",
        Unknown => "unknown",
    }
}

/// A worker instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polecat {
    pub name: PolecatName,
    pub rig: RigName,
    /// Isolated worktree root (`<town>/<rig>/polecats/<name>`).
    pub clone_path: PathBuf,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_item: Option<BeadId>,
    pub state: PolecatState,
    pub created_at: String,
    pub updated_at: String,
}

impl Polecat {
    /// The session name this polecat's agent runs under.
    pub fn session_id(&self) -> SessionId {
        SessionId::new(format!("gt-{}-{}", self.rig, self.name))
    }
}

#[cfg(test)]
#[path = "polecat_tests.rs"]
mod tests;
