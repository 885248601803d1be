// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refinery: the serial merge engine for a rig.
//!
//! Polls the tracker for ready merge requests, scores them, claims the
//! winner, merges, and reports the outcome to the witness over mail.
//! Conflicts are delegated, never resolved inline: a conflict-resolution
//! task is created under the cluster-wide merge slot and the request is
//! blocked on it.

mod merge;
mod score;

pub use merge::{merge_one, run_tests, MergeJob, MergeOutcome, TestsOutcome};
pub use score::ScoreParams;

use crate::convoy;
use crate::slot::{MergeSlot, SlotError};
use crate::town::TownPaths;
use gt_adapters::git::{GitAdapter, GitError};
use gt_adapters::tracker::{CreateRequest, TrackerAdapter, TrackerError, UpdateRequest};
use gt_core::clock::Clock;
use gt_core::issue::{BeadId, IssueStatus, IssueType, WorkItem};
use gt_core::merge_request::MergeRequestFields;
use gt_core::protocol::{FailureType, ProtocolMessage};
use gt_mail::router::{Router, SendOptions};
use gt_mail::store::MailError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Conflict handling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnConflict {
    /// Assign the conflict-resolution task back to the worker that
    /// produced the branch.
    #[default]
    AssignBack,
    /// Leave the task unassigned for any worker to claim.
    AutoRebase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineryConfig {
    /// Defaults to the rig repository's default branch.
    pub target_branch: Option<String>,
    pub on_conflict: OnConflict,
    pub run_tests: bool,
    pub test_command: Option<String>,
    pub delete_merged_branches: bool,
    /// Test attempts before a failure is believed.
    pub retry_flaky_tests: u32,
    pub poll_interval_secs: u64,
    pub max_concurrent: usize,
    pub score: ScoreParams,
}

impl Default for RefineryConfig {
    fn default() -> Self {
        Self {
            target_branch: None,
            on_conflict: OnConflict::AssignBack,
            run_tests: false,
            test_command: None,
            delete_merged_branches: false,
            retry_flaky_tests: 1,
            poll_interval_secs: 30,
            max_concurrent: 1,
            score: ScoreParams::default(),
        }
    }
}

impl RefineryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Error)]
pub enum RefineryError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error("mail: {0}")]
    Mail(#[from] MailError),
}

/// What one `process_next` pass did.
#[derive(Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// No unclaimed ready merge requests.
    Idle,
    /// A request was processed (merged, delegated, or failed).
    Processed(BeadId),
    /// A request was deferred (merge slot held elsewhere).
    Deferred(BeadId),
    Cancelled,
}

pub struct Refinery<C: Clock> {
    town: TownPaths,
    rig: String,
    config: RefineryConfig,
    git: Arc<dyn GitAdapter>,
    tracker: Arc<dyn TrackerAdapter>,
    router: Arc<Router>,
    slot: MergeSlot,
    events: Option<crate::events::EventLog>,
    clock: C,
    identity: String,
}

impl<C: Clock> Refinery<C> {
    pub fn new(
        town: TownPaths,
        rig: impl Into<String>,
        config: RefineryConfig,
        git: Arc<dyn GitAdapter>,
        tracker: Arc<dyn TrackerAdapter>,
        router: Arc<Router>,
        clock: C,
    ) -> Self {
        let rig = rig.into();
        let slot = MergeSlot::new(tracker.clone(), &rig);
        let identity = format!("{rig}/refinery");
        Self {
            town,
            rig,
            config,
            git,
            tracker,
            router,
            slot,
            events: None,
            clock,
            identity,
        }
    }

    pub fn with_events(mut self, events: crate::events::EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Claim identity used as the tracker assignee.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn emit(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(events) = &self.events {
            let record = gt_core::event::EventRecord::new(
                self.clock.rfc3339(),
                event_type,
                self.identity.clone(),
                payload,
                gt_core::event::Visibility::Both,
            );
            if let Err(err) = events.append(&record) {
                warn!(error = %err, "event append failed");
            }
        }
    }

    fn repo(&self) -> PathBuf {
        self.town.refinery_checkout(&self.rig)
    }

    /// The poll loop. Processes requests serially until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(rig = %self.rig, "refinery started");
        loop {
            // Drain the ready queue, one request at a time
            loop {
                if cancel.is_cancelled() {
                    info!(rig = %self.rig, "refinery stopped");
                    return;
                }
                match self.process_next(&cancel).await {
                    Ok(PassOutcome::Processed(id)) => {
                        info!(request = %id, "request processed");
                    }
                    Ok(PassOutcome::Deferred(id)) => {
                        // Leave it ready; another refinery holds the slot
                        info!(request = %id, "deferred; merge slot held elsewhere");
                        break;
                    }
                    Ok(PassOutcome::Idle) | Ok(PassOutcome::Cancelled) => break,
                    Err(err) => {
                        // One poisoned request never stalls the queue
                        error!(error = %err, "merge pass failed");
                        break;
                    }
                }
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    info!(rig = %self.rig, "refinery stopped");
                    return;
                }
                () = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }
    }

    /// One pass: pick the highest-scoring unclaimed ready request,
    /// claim it, merge it, report the outcome.
    pub async fn process_next(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, RefineryError> {
        let Some((item, fields)) = self.best_candidate().await? else {
            return Ok(PassOutcome::Idle);
        };
        let id = item.id.clone();

        self.claim(&id).await?;
        let outcome = match self.process_claimed(&item, &fields, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // Release the claim so the request can be retried
                let _ = self.unclaim(&id).await;
                return Err(err);
            }
        };
        Ok(outcome)
    }

    /// Score all unclaimed ready merge requests and return the winner.
    /// Scores are recomputed every poll; there is no stored rank.
    async fn best_candidate(
        &self,
    ) -> Result<Option<(WorkItem, MergeRequestFields)>, RefineryError> {
        let ready = self
            .tracker
            .ready_with_type(IssueType::MergeRequest)
            .await?;
        let now = self.clock.now_utc();
        let mut best: Option<(f64, WorkItem, MergeRequestFields)> = None;
        for item in ready {
            if item.assignee.as_deref().is_some_and(|a| !a.is_empty()) {
                continue;
            }
            let fields = MergeRequestFields::from_description(&item.description);
            let score = self.config.score.score(&item, &fields, now);
            if best.as_ref().is_none_or(|(s, _, _)| score > *s) {
                best = Some((score, item, fields));
            }
        }
        Ok(best.map(|(_, item, fields)| (item, fields)))
    }

    async fn claim(&self, id: &BeadId) -> Result<(), RefineryError> {
        self.tracker
            .update(
                id,
                UpdateRequest {
                    assignee: Some(Some(self.identity.clone())),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    async fn unclaim(&self, id: &BeadId) -> Result<(), RefineryError> {
        self.tracker
            .update(
                id,
                UpdateRequest {
                    assignee: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    async fn process_claimed(
        &self,
        item: &WorkItem,
        fields: &MergeRequestFields,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, RefineryError> {
        let Some(branch) = fields.branch.clone() else {
            // Malformed request: push it down the failure path instead
            // of erroring, so it cannot wedge the queue
            self.on_failed(
                item,
                fields,
                "",
                FailureType::Build,
                format!("merge request {} has no Branch field", item.id),
            )
            .await?;
            return Ok(PassOutcome::Processed(item.id.clone()));
        };
        let repo = self.repo();
        let target = match (&fields.target, &self.config.target_branch) {
            (Some(target), _) => target.clone(),
            (None, Some(target)) => target.clone(),
            (None, None) => self.git.default_branch(&repo).await?,
        };

        let job = MergeJob {
            repo: &repo,
            branch: &branch,
            target: &target,
            test_command: self
                .config
                .run_tests
                .then_some(self.config.test_command.as_deref())
                .flatten(),
            test_attempts: self.config.retry_flaky_tests,
        };

        match merge_one(self.git.as_ref(), job, cancel).await? {
            MergeOutcome::Merged { commit } => {
                self.on_merged(item, fields, &branch, &target, &commit).await?;
                Ok(PassOutcome::Processed(item.id.clone()))
            }
            MergeOutcome::Conflict { files } => {
                self.on_conflict(item, fields, &branch, &target, files).await
            }
            MergeOutcome::Failed { failure, error } => {
                self.on_failed(item, fields, &branch, failure, error).await?;
                Ok(PassOutcome::Processed(item.id.clone()))
            }
            MergeOutcome::Cancelled => {
                let _ = self.unclaim(&item.id).await;
                Ok(PassOutcome::Cancelled)
            }
        }
    }

    /// Success: close out the request and its source issue, observe
    /// convoys, clear the worker's active_mr, optionally delete the
    /// branch, notify the witness.
    async fn on_merged(
        &self,
        item: &WorkItem,
        fields: &MergeRequestFields,
        branch: &str,
        target: &str,
        commit: &str,
    ) -> Result<(), RefineryError> {
        let mut updated = fields.clone();
        updated.merge_commit = Some(commit.to_string());
        updated.close_reason = Some("merged".to_string());
        self.tracker
            .update(
                &item.id,
                UpdateRequest {
                    description: Some(updated.apply_to(&item.description)),
                    ..Default::default()
                },
            )
            .await?;
        self.tracker.close(&item.id, Some("merged")).await?;

        if let Some(source) = &fields.source_issue {
            let reason = format!("Merged in {}", item.id);
            if let Err(err) = self.tracker.close(source, Some(&reason)).await {
                if !err.is_not_found() {
                    return Err(err.into());
                }
            }
            if let Err(err) =
                convoy::check_convoys_for_issue(self.tracker.clone(), source, &self.identity).await
            {
                warn!(issue = %source, error = %err, "convoy check failed after merge");
            }
        }

        if let Some(worker) = &fields.worker {
            self.clear_active_mr(worker).await?;
        }

        if self.config.delete_merged_branches {
            if let Err(err) = self.git.delete_branch(&self.repo(), branch).await {
                warn!(branch, error = %err, "local branch delete failed");
            }
            if let Err(err) = self
                .git
                .delete_remote_branch(&self.repo(), "origin", branch)
                .await
            {
                warn!(branch, error = %err, "remote branch delete failed");
            }
        }

        self.emit(
            "merge.completed",
            serde_json::json!({"mr": item.id, "branch": branch, "commit": commit}),
        );
        self.notify_witness(ProtocolMessage::Merged {
            polecat: fields.worker.clone().unwrap_or_default(),
            rig: self.rig.clone(),
            branch: branch.to_string(),
            target: target.to_string(),
            merged_at: self.clock.rfc3339(),
            merge_commit: Some(commit.to_string()),
        })
        .await
    }

    /// Conflict: non-blocking delegation under the cluster-wide merge
    /// slot.
    async fn on_conflict(
        &self,
        item: &WorkItem,
        fields: &MergeRequestFields,
        branch: &str,
        target: &str,
        files: Vec<String>,
    ) -> Result<PassOutcome, RefineryError> {
        match self.slot.acquire(&self.identity).await {
            Ok(()) => {}
            Err(SlotError::Held { holder, .. }) => {
                // Defer: leave the request ready for a later poll
                self.unclaim(&item.id).await?;
                info!(request = %item.id, holder = %holder, "merge slot held; deferring conflict dispatch");
                return Ok(PassOutcome::Deferred(item.id.clone()));
            }
            Err(err) => return Err(err.into()),
        }

        let dispatch = self
            .dispatch_conflict_task(item, fields, branch, target, &files)
            .await;
        // The slot only serializes dispatch; release it regardless
        let _ = self.slot.release(&self.identity).await;
        dispatch?;
        self.emit(
            "merge.conflict",
            serde_json::json!({"mr": item.id, "branch": branch, "files": &files}),
        );

        self.notify_witness(ProtocolMessage::MergeFailed {
            polecat: fields.worker.clone().unwrap_or_default(),
            rig: self.rig.clone(),
            branch: branch.to_string(),
            failed_at: self.clock.rfc3339(),
            failure_type: FailureType::Conflict,
            error: Some(format!("{} conflicting files", files.len())),
            conflict_files: files,
        })
        .await?;
        Ok(PassOutcome::Processed(item.id.clone()))
    }

    async fn dispatch_conflict_task(
        &self,
        item: &WorkItem,
        fields: &MergeRequestFields,
        branch: &str,
        target: &str,
        files: &[String],
    ) -> Result<(), RefineryError> {
        // First 8 chars of the conflict target so the resolver knows
        // exactly what it rebased onto
        let target_sha = match self.git.rev_parse(&self.repo(), &format!("origin/{target}")).await {
            Ok(sha) => sha,
            Err(_) => self.git.rev_parse(&self.repo(), target).await?,
        };
        let target_sha = &target_sha[..target_sha.len().min(8)];

        let retry_count = fields.retry_count + 1;
        let mut description = format!(
            "Merge of {branch} into {target} hit conflicts.\n\
             \n\
             Branch: {branch}\n\
             Target: {target}\n\
             Conflict-Target: {target_sha}\n\
             Retry-Count: {retry_count}\n"
        );
        if !files.is_empty() {
            description.push_str(&format!("Conflict-Files: {}\n", files.join(", ")));
        }
        description.push_str(&format!(
            "\nResolution steps:\n\
             1. cd into your worker clone\n\
             2. git fetch origin\n\
             3. git rebase origin/{target} {branch}\n\
             4. resolve each conflicted file, then git rebase --continue\n\
             5. close this task; the merge request retries automatically\n"
        ));

        let task = self
            .tracker
            .create(CreateRequest {
                title: format!("Resolve merge conflict: {branch}"),
                issue_type: Some(IssueType::Task),
                priority: Some(item.priority.boosted()),
                description: Some(description),
                ..Default::default()
            })
            .await?;

        if self.config.on_conflict == OnConflict::AssignBack {
            if let Some(worker) = &fields.worker {
                self.tracker
                    .update(
                        &task,
                        UpdateRequest {
                            assignee: Some(Some(worker.clone())),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        }

        // Block the merge request on the resolution task: when the task
        // closes, the request re-enters the ready front.
        self.tracker.dep_add(&item.id, &task, None).await?;

        // Record the retry and release the claim; the request is now
        // blocked, not ready, so nothing re-claims it early.
        let mut updated = fields.clone();
        updated.retry_count = retry_count;
        self.tracker
            .update(
                &item.id,
                UpdateRequest {
                    description: Some(updated.apply_to(&item.description)),
                    assignee: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        info!(request = %item.id, task = %task, "conflict delegated");
        Ok(())
    }

    /// Non-conflict failure: reopen the request and tell the witness.
    /// The retry count still climbs so a persistently failing request
    /// sinks in the queue instead of starving it.
    async fn on_failed(
        &self,
        item: &WorkItem,
        fields: &MergeRequestFields,
        branch: &str,
        failure: FailureType,
        error: String,
    ) -> Result<(), RefineryError> {
        let mut updated = fields.clone();
        updated.retry_count += 1;
        self.tracker
            .update(
                &item.id,
                UpdateRequest {
                    description: Some(updated.apply_to(&item.description)),
                    status: Some(IssueStatus::Open),
                    assignee: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        self.notify_witness(ProtocolMessage::MergeFailed {
            polecat: fields.worker.clone().unwrap_or_default(),
            rig: self.rig.clone(),
            branch: branch.to_string(),
            failed_at: self.clock.rfc3339(),
            failure_type: failure,
            error: Some(error),
            conflict_files: Vec::new(),
        })
        .await
    }

    async fn clear_active_mr(&self, worker: &str) -> Result<(), RefineryError> {
        let bead = BeadId::new(format!("{}-agent-{worker}", self.rig));
        let item = match self.tracker.show(&bead).await {
            Ok(item) => item,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        self.tracker
            .update(
                &bead,
                UpdateRequest {
                    description: Some(gt_core::fields::set_field(
                        &item.description,
                        "active_mr",
                        "",
                    )),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    async fn notify_witness(&self, message: ProtocolMessage) -> Result<(), RefineryError> {
        let to = format!("{}/witness", self.rig);
        match self
            .router
            .send(
                &self.identity,
                &to,
                &message.subject(),
                &message.body(),
                SendOptions::at(self.clock.rfc3339()),
            )
            .await
        {
            Ok(_) => Ok(()),
            // A rig without a witness still merges; the signal is lost,
            // not fatal
            Err(MailError::UnknownRecipient(addr)) => {
                warn!(addr = %addr, "witness not registered; outcome not delivered");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
