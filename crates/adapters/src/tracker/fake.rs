// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory tracker for tests.
//!
//! Mirrors the CLI contract closely enough for the engine's logic:
//! readiness is computed from blocking dependency edges, closed items
//! never appear ready, and not-found errors carry the same stderr text
//! the real CLI produces so error predicates behave identically.

use super::{
    CreateRequest, DepDirection, ListFilter, TrackerAdapter, TrackerError, UpdateRequest,
};
use async_trait::async_trait;
use gt_core::issue::{BeadId, IssueStatus, IssueType, Priority, WorkItem};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct DepEdge {
    from: BeadId,
    to: BeadId,
    dep_type: String,
}

#[derive(Default)]
struct Inner {
    items: HashMap<String, WorkItem>,
    deps: Vec<DepEdge>,
    config: HashMap<String, String>,
    next_id: u64,
}

/// Shared-handle in-memory tracker.
#[derive(Clone, Default)]
pub struct FakeTracker {
    inner: Arc<Mutex<Inner>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an item directly (bypasses `create`).
    pub fn insert(&self, item: WorkItem) {
        self.inner.lock().items.insert(item.id.to_string(), item);
    }

    /// Snapshot of every stored item.
    pub fn all(&self) -> Vec<WorkItem> {
        let inner = self.inner.lock();
        let mut items: Vec<WorkItem> = inner
            .items
            .values()
            .map(|item| with_blocked_by(item, &inner))
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    fn not_found(op: &'static str) -> TrackerError {
        TrackerError::Cli {
            op,
            code: Some(1),
            stderr: "bead not found".to_string(),
        }
    }
}

/// Open blocking deps of `item`, recomputed on every read.
fn with_blocked_by(item: &WorkItem, inner: &Inner) -> WorkItem {
    let mut item = item.clone();
    item.blocked_by = inner
        .deps
        .iter()
        .filter(|edge| edge.from == item.id && edge.dep_type == "blocks")
        .filter(|edge| {
            inner
                .items
                .get(edge.to.as_str())
                .is_some_and(|dep| !dep.status.is_closed())
        })
        .map(|edge| edge.to.clone())
        .collect();
    item.depends_on = inner
        .deps
        .iter()
        .filter(|edge| edge.from == item.id)
        .map(|edge| edge.to.clone())
        .collect();
    item
}

#[async_trait]
impl TrackerAdapter for FakeTracker {
    async fn create(&self, req: CreateRequest) -> Result<BeadId, TrackerError> {
        let mut inner = self.inner.lock();
        let id = match req.id {
            Some(id) => {
                if inner.items.contains_key(id.as_str()) && !req.force {
                    return Err(TrackerError::Cli {
                        op: "create",
                        code: Some(1),
                        stderr: format!("bead already exists: {id}"),
                    });
                }
                id
            }
            None => {
                inner.next_id += 1;
                BeadId::new(format!("gt-{:04}", inner.next_id))
            }
        };
        let item = WorkItem {
            id: id.clone(),
            title: req.title,
            issue_type: req.issue_type.unwrap_or(IssueType::Task),
            status: IssueStatus::Open,
            priority: req.priority.unwrap_or(Priority::DEFAULT),
            assignee: None,
            labels: req.labels.into_iter().collect(),
            depends_on: Vec::new(),
            blocked_by: Vec::new(),
            description: req.description.unwrap_or_default(),
            created_at: None,
        };
        inner.items.insert(id.to_string(), item);
        if let Some(parent) = req.parent {
            inner.deps.push(DepEdge {
                from: id.clone(),
                to: parent,
                dep_type: "parent".to_string(),
            });
        }
        Ok(id)
    }

    async fn update(&self, id: &BeadId, update: UpdateRequest) -> Result<(), TrackerError> {
        let mut inner = self.inner.lock();
        let item = inner
            .items
            .get_mut(id.as_str())
            .ok_or_else(|| Self::not_found("update"))?;
        if let Some(title) = update.title {
            item.title = title;
        }
        if let Some(description) = update.description {
            item.description = description;
        }
        if let Some(status) = update.status {
            item.status = status;
        }
        if let Some(assignee) = update.assignee {
            item.assignee = assignee;
        }
        if let Some(priority) = update.priority {
            item.priority = priority;
        }
        if let Some(labels) = update.labels {
            item.labels = labels.into_iter().collect();
        }
        Ok(())
    }

    async fn close(&self, id: &BeadId, reason: Option<&str>) -> Result<(), TrackerError> {
        let mut inner = self.inner.lock();
        let item = inner
            .items
            .get_mut(id.as_str())
            .ok_or_else(|| Self::not_found("close"))?;
        item.status = IssueStatus::Closed;
        if let Some(reason) = reason {
            item.description =
                gt_core::fields::set_field(&item.description, "Close-Reason", reason);
        }
        Ok(())
    }

    async fn show(&self, id: &BeadId) -> Result<WorkItem, TrackerError> {
        let inner = self.inner.lock();
        inner
            .items
            .get(id.as_str())
            .map(|item| with_blocked_by(item, &inner))
            .ok_or_else(|| Self::not_found("show"))
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<WorkItem>, TrackerError> {
        let inner = self.inner.lock();
        let mut items: Vec<WorkItem> = inner
            .items
            .values()
            .filter(|item| filter.issue_type.is_none_or(|t| item.issue_type == t))
            .filter(|item| filter.status.is_none_or(|s| item.status == s))
            .filter(|item| {
                filter
                    .label
                    .as_ref()
                    .is_none_or(|l| item.labels.contains(l))
            })
            .filter(|item| filter.priority.is_none_or(|p| item.priority == p))
            .filter(|item| {
                filter.parent.as_ref().is_none_or(|parent| {
                    inner.deps.iter().any(|edge| {
                        edge.from == item.id && edge.dep_type == "parent" && &edge.to == parent
                    })
                })
            })
            .map(|item| with_blocked_by(item, &inner))
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn ready(&self) -> Result<Vec<WorkItem>, TrackerError> {
        Ok(self
            .all()
            .into_iter()
            .filter(WorkItem::is_ready)
            .collect())
    }

    async fn ready_with_type(&self, issue_type: IssueType) -> Result<Vec<WorkItem>, TrackerError> {
        Ok(self
            .ready()
            .await?
            .into_iter()
            .filter(|item| item.issue_type == issue_type)
            .collect())
    }

    async fn dep_add(
        &self,
        from: &BeadId,
        to: &BeadId,
        dep_type: Option<&str>,
    ) -> Result<(), TrackerError> {
        let mut inner = self.inner.lock();
        if !inner.items.contains_key(from.as_str()) || !inner.items.contains_key(to.as_str()) {
            return Err(Self::not_found("dep add"));
        }
        inner.deps.push(DepEdge {
            from: from.clone(),
            to: to.clone(),
            dep_type: dep_type.unwrap_or("blocks").to_string(),
        });
        Ok(())
    }

    async fn dep_list(
        &self,
        id: &BeadId,
        direction: DepDirection,
        dep_type: Option<&str>,
    ) -> Result<Vec<WorkItem>, TrackerError> {
        let inner = self.inner.lock();
        let matches = |edge: &&DepEdge| dep_type.is_none_or(|t| edge.dep_type == t);
        let ids: Vec<BeadId> = match direction {
            DepDirection::Down => inner
                .deps
                .iter()
                .filter(|edge| edge.from == *id)
                .filter(matches)
                .map(|edge| edge.to.clone())
                .collect(),
            DepDirection::Up => inner
                .deps
                .iter()
                .filter(|edge| edge.to == *id)
                .filter(matches)
                .map(|edge| edge.from.clone())
                .collect(),
        };
        Ok(ids
            .iter()
            .filter_map(|id| inner.items.get(id.as_str()))
            .map(|item| with_blocked_by(item, &inner))
            .collect())
    }

    async fn dep_remove(&self, from: &BeadId, to: &BeadId) -> Result<(), TrackerError> {
        let mut inner = self.inner.lock();
        inner
            .deps
            .retain(|edge| !(edge.from == *from && edge.to == *to));
        Ok(())
    }

    async fn config_get(&self, key: &str) -> Result<Option<String>, TrackerError> {
        Ok(self.inner.lock().config.get(key).cloned())
    }

    async fn config_set(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        self.inner
            .lock()
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
