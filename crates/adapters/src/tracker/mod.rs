// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue tracker adapter.
//!
//! The tracker is an external CLI whose JSON output is the contract;
//! stderr carries human-readable errors that callers classify by
//! substring where exit codes would be ambiguous.

mod cli;
#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use cli::BeadsCli;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTracker;

use async_trait::async_trait;
use gt_core::issue::{BeadId, IssueStatus, IssueType, Priority, WorkItem};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker: {0}")]
    Subprocess(#[from] crate::subprocess::SubprocessError),
    #[error("tracker {op} failed (exit {code:?}): {stderr}")]
    Cli {
        op: &'static str,
        code: Option<i32>,
        stderr: String,
    },
    #[error("tracker returned unparsable JSON for {op}: {source}")]
    Parse {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl TrackerError {
    /// Stderr of the underlying CLI call, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            TrackerError::Cli { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// The item does not exist.
    pub fn is_not_found(&self) -> bool {
        self.stderr()
            .is_some_and(|s| s.contains("bead not found") || s.contains("not found"))
    }

    /// The id failed tracker-side validation.
    pub fn is_invalid_id(&self) -> bool {
        self.stderr().is_some_and(|s| s.contains("invalid id format"))
    }
}

/// Fields for `create`.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub title: String,
    pub issue_type: Option<IssueType>,
    pub priority: Option<Priority>,
    pub description: Option<String>,
    pub parent: Option<BeadId>,
    pub labels: Vec<String>,
    /// Explicit id override (e.g. slot items with well-known ids).
    pub id: Option<BeadId>,
    /// Create even if an item with the override id already existed.
    pub force: bool,
}

impl CreateRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Fields for `update`; None leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<IssueStatus>,
    /// `Some(None)` clears the assignee, `Some(Some(x))` sets it.
    pub assignee: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub labels: Option<Vec<String>>,
}

/// Filters for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub issue_type: Option<IssueType>,
    pub status: Option<IssueStatus>,
    pub label: Option<String>,
    pub parent: Option<BeadId>,
    pub priority: Option<Priority>,
}

/// Dependency query direction relative to the given item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepDirection {
    /// Items this one depends on.
    Down,
    /// Items that depend on this one.
    Up,
}

#[async_trait]
pub trait TrackerAdapter: Send + Sync {
    async fn create(&self, req: CreateRequest) -> Result<BeadId, TrackerError>;
    async fn update(&self, id: &BeadId, update: UpdateRequest) -> Result<(), TrackerError>;
    async fn close(&self, id: &BeadId, reason: Option<&str>) -> Result<(), TrackerError>;
    async fn show(&self, id: &BeadId) -> Result<WorkItem, TrackerError>;
    async fn list(&self, filter: ListFilter) -> Result<Vec<WorkItem>, TrackerError>;
    /// Open items with no open dependencies.
    async fn ready(&self) -> Result<Vec<WorkItem>, TrackerError>;
    async fn ready_with_type(&self, issue_type: IssueType) -> Result<Vec<WorkItem>, TrackerError>;
    /// `from` depends on `to`; `dep_type` defaults to a plain blocking
    /// edge ("blocks") when None.
    async fn dep_add(
        &self,
        from: &BeadId,
        to: &BeadId,
        dep_type: Option<&str>,
    ) -> Result<(), TrackerError>;
    async fn dep_list(
        &self,
        id: &BeadId,
        direction: DepDirection,
        dep_type: Option<&str>,
    ) -> Result<Vec<WorkItem>, TrackerError>;
    async fn dep_remove(&self, from: &BeadId, to: &BeadId) -> Result<(), TrackerError>;
    async fn config_get(&self, key: &str) -> Result<Option<String>, TrackerError>;
    async fn config_set(&self, key: &str, value: &str) -> Result<(), TrackerError>;
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
