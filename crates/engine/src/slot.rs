// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster-wide merge slot.
//!
//! A single token per rig, externalized to the tracker, used only to
//! serialize conflict-resolution dispatch across refineries. Steady-state
//! merges never touch it. Reentrant for the same holder.

use gt_adapters::tracker::{CreateRequest, TrackerAdapter, TrackerError, UpdateRequest};
use gt_core::issue::{BeadId, IssueType};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SlotError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("merge slot for {rig} held by {holder}")]
    Held { rig: String, holder: String },
}

pub struct MergeSlot {
    tracker: Arc<dyn TrackerAdapter>,
    rig: String,
}

impl MergeSlot {
    pub fn new(tracker: Arc<dyn TrackerAdapter>, rig: impl Into<String>) -> Self {
        Self {
            tracker,
            rig: rig.into(),
        }
    }

    pub fn bead_id(&self) -> BeadId {
        BeadId::new(format!("{}-merge-slot", self.rig))
    }

    /// Create the slot item if it does not exist.
    pub async fn ensure(&self) -> Result<(), SlotError> {
        let id = self.bead_id();
        if self.tracker.show(&id).await.is_ok() {
            return Ok(());
        }
        match self
            .tracker
            .create(CreateRequest {
                title: format!("merge slot for {}", self.rig),
                issue_type: Some(IssueType::Slot),
                id: Some(id),
                ..Default::default()
            })
            .await
        {
            Ok(_) => Ok(()),
            // A racing refinery created it first; that's what we wanted
            Err(err) if err.stderr().is_some_and(|s| s.contains("already exists")) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Acquire for `holder`. Reentrant: succeeds when already held by
    /// the same holder.
    pub async fn acquire(&self, holder: &str) -> Result<(), SlotError> {
        self.ensure().await?;
        let item = self.tracker.show(&self.bead_id()).await?;
        match item.assignee.as_deref() {
            Some(current) if !current.is_empty() && current != holder => {
                return Err(SlotError::Held {
                    rig: self.rig.clone(),
                    holder: current.to_string(),
                });
            }
            Some(current) if current == holder => {
                debug!(rig = %self.rig, holder, "merge slot re-entered");
                return Ok(());
            }
            _ => {}
        }
        self.tracker
            .update(
                &self.bead_id(),
                UpdateRequest {
                    assignee: Some(Some(holder.to_string())),
                    ..Default::default()
                },
            )
            .await?;
        debug!(rig = %self.rig, holder, "merge slot acquired");
        Ok(())
    }

    /// Release if held by `holder`; releasing a free slot is a no-op.
    pub async fn release(&self, holder: &str) -> Result<(), SlotError> {
        let item = match self.tracker.show(&self.bead_id()).await {
            Ok(item) => item,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        match item.assignee.as_deref() {
            None | Some("") => Ok(()),
            Some(current) if current == holder => {
                self.tracker
                    .update(
                        &self.bead_id(),
                        UpdateRequest {
                            assignee: Some(None),
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(())
            }
            Some(current) => Err(SlotError::Held {
                rig: self.rig.clone(),
                holder: current.to_string(),
            }),
        }
    }

    /// The current holder, if any.
    pub async fn holder(&self) -> Result<Option<String>, SlotError> {
        match self.tracker.show(&self.bead_id()).await {
            Ok(item) => Ok(item.assignee.filter(|a| !a.is_empty())),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
