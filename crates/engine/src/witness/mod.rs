// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Witness: the safety valve for a rig.
//!
//! Consumes worker and refinery signals from its mailbox, audits git
//! state before authorizing teardown, and escalates anything that risks
//! losing work. Dispatch is a closed match over the parsed message
//! kind; subjects outside the protocol pass through untouched so
//! ordinary mail is never lost.

mod audit;

pub use audit::{auto_nuke_decision, verify_commit_on_main, NukeDecision};

use crate::events::EventLog;
use crate::polecats::{Manager, ManagerError};
use gt_adapters::git::GitAdapter;
use gt_adapters::session::{SessionAdapter, SessionError};
use gt_adapters::tracker::{CreateRequest, ListFilter, TrackerAdapter, TrackerError, UpdateRequest};
use gt_core::clock::Clock;
use gt_core::issue::{IssueStatus, IssueType};
use gt_core::message::Message;
use gt_core::polecat::CleanupStatus;
use gt_core::protocol::{DoneStatus, FailureType, MessageKind, ProtocolMessage};
use gt_mail::router::{Router, SendOptions};
use gt_mail::store::{MailError, MailboxStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WitnessConfig {
    /// Escalation target for RECOVERY_NEEDED and hard HELP cases.
    pub coordinator: String,
    pub poll_interval_secs: u64,
}

impl Default for WitnessConfig {
    fn default() -> Self {
        Self {
            coordinator: "mayor".to_string(),
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum WitnessError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error("mail: {0}")]
    Mail(#[from] MailError),
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// Protocol message dispatched to its handler.
    Dispatched(MessageKind),
    /// Not protocol traffic; left untouched.
    PassedThrough,
    /// POLECAT_DONE older than the current session incarnation.
    DroppedStale,
}

/// HELP triage verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpAction {
    /// Informational: answer locally, no human needed.
    AnswerLocally,
    /// Risky or blocking: escalate to the coordinator.
    Escalate,
}

/// Classify a HELP topic. Questions are informational; anything that
/// smells like being wedged goes to the coordinator.
pub fn classify_help(topic: &str) -> HelpAction {
    let topic = topic.to_ascii_lowercase();
    const ESCALATE_MARKERS: &[&str] = &[
        "stuck", "blocked", "broken", "conflict", "corrupt", "lost", "crash", "wedge",
    ];
    if ESCALATE_MARKERS.iter().any(|m| topic.contains(m)) {
        return HelpAction::Escalate;
    }
    const INFO_MARKERS: &[&str] = &["how", "where", "what", "which", "when", "why", "docs"];
    if INFO_MARKERS.iter().any(|m| topic.contains(m)) {
        return HelpAction::AnswerLocally;
    }
    HelpAction::Escalate
}

pub struct Witness<C: Clock> {
    rig: String,
    config: WitnessConfig,
    git: Arc<dyn GitAdapter>,
    tracker: Arc<dyn TrackerAdapter>,
    sessions: Arc<dyn SessionAdapter>,
    store: Arc<dyn MailboxStore>,
    router: Arc<Router>,
    manager: Arc<Manager<C>>,
    events: Option<EventLog>,
    clock: C,
}

impl<C: Clock> Witness<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rig: impl Into<String>,
        config: WitnessConfig,
        git: Arc<dyn GitAdapter>,
        tracker: Arc<dyn TrackerAdapter>,
        sessions: Arc<dyn SessionAdapter>,
        store: Arc<dyn MailboxStore>,
        router: Arc<Router>,
        manager: Arc<Manager<C>>,
        clock: C,
    ) -> Self {
        Self {
            rig: rig.into(),
            config,
            git,
            tracker,
            sessions,
            store,
            router,
            manager,
            events: None,
            clock,
        }
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn address(&self) -> String {
        format!("{}/witness", self.rig)
    }

    fn session_for(&self, polecat: &str) -> String {
        format!("gt-{}-{polecat}", self.rig)
    }

    fn cleanup_label(&self, polecat: &str) -> String {
        format!("cleanup:{}/{polecat}", self.rig)
    }

    /// Poll loop: drain unread protocol mail until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(rig = %self.rig, "witness started");
        loop {
            if let Err(err) = self.process_mailbox().await {
                warn!(error = %err, "witness mailbox pass failed");
            }
            tokio::select! {
                () = cancel.cancelled() => {
                    info!(rig = %self.rig, "witness stopped");
                    return;
                }
                () = tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)) => {}
            }
        }
    }

    /// Handle every unread message once, marking protocol mail read.
    pub async fn process_mailbox(&self) -> Result<usize, WitnessError> {
        let mailbox = self.address();
        let unread = self.store.list_unread(&mailbox).await?;
        let mut handled = 0;
        for message in unread.iter().rev() {
            match self.handle_message(message).await {
                Ok(Handled::PassedThrough) => {}
                Ok(_) => {
                    handled += 1;
                    self.store.mark_read(&mailbox, &message.id).await?;
                }
                Err(err) => {
                    // One poisoned message never stalls the mailbox
                    warn!(subject = %message.subject, error = %err, "handler failed");
                    self.store.mark_read(&mailbox, &message.id).await?;
                }
            }
        }
        Ok(handled)
    }

    /// Dispatch one message by its parsed kind.
    pub async fn handle_message(&self, message: &Message) -> Result<Handled, WitnessError> {
        let Some(parsed) = ProtocolMessage::parse(&message.subject, &message.body) else {
            return Ok(Handled::PassedThrough);
        };
        let kind = parsed.kind();
        match parsed {
            ProtocolMessage::PolecatDone {
                polecat,
                status,
                merge_request,
                ..
            } => {
                if self.is_stale(&polecat, &message.timestamp).await {
                    info!(polecat = %polecat, "dropping stale POLECAT_DONE");
                    return Ok(Handled::DroppedStale);
                }
                self.on_polecat_done(&polecat, status, merge_request.as_ref())
                    .await?;
            }
            ProtocolMessage::LifecycleShutdown { polecat, .. } => {
                self.recycle(&polecat).await?;
            }
            ProtocolMessage::Merged { polecat, .. } => {
                self.on_merged(&polecat).await?;
            }
            ProtocolMessage::MergeFailed {
                polecat,
                failure_type,
                error,
                conflict_files,
                ..
            } => {
                self.on_merge_failed(&polecat, failure_type, error.as_deref(), &conflict_files)
                    .await?;
            }
            ProtocolMessage::Help {
                polecat,
                topic,
                detail,
                ..
            } => {
                self.on_help(&polecat, &topic, &detail).await?;
            }
            ProtocolMessage::PolecatStarted { polecat, .. } => {
                info!(polecat = %polecat, "polecat started");
            }
            ProtocolMessage::MergeReady { .. } | ProtocolMessage::ReworkRequest { .. } => {
                // Refinery-bound traffic; nothing for the witness to do
            }
        }
        Ok(Handled::Dispatched(kind))
    }

    /// A POLECAT_DONE older than the polecat's current session is a
    /// residue of a prior incarnation of the same name.
    async fn is_stale(&self, polecat: &str, timestamp: &str) -> bool {
        let Ok(created) = self
            .sessions
            .created_at_epoch(&self.session_for(polecat))
            .await
        else {
            // No current session: nothing to be stale against
            return false;
        };
        let Ok(message_time) = chrono::DateTime::parse_from_rfc3339(timestamp) else {
            return false;
        };
        message_time.timestamp() < created
    }

    async fn on_polecat_done(
        &self,
        polecat: &str,
        status: DoneStatus,
        merge_request: Option<&gt_core::issue::BeadId>,
    ) -> Result<(), WitnessError> {
        if status == DoneStatus::PhaseComplete {
            return self.recycle(polecat).await;
        }

        if let Some(mr) = merge_request {
            // Local branch must survive for possible conflict
            // resolution: track, never nuke here.
            self.create_cleanup_item(polecat, "merge-requested", Some(mr.as_str()))
                .await?;
            return Ok(());
        }

        // ESCALATED / DEFERRED / COMPLETED without an MR
        let worker_clone = match self.manager.get(polecat).await {
            Ok(p) => p.clone_path,
            Err(ManagerError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let status = self.manager.cleanup_status(polecat).await;
        match auto_nuke_decision(status, self.git.as_ref(), &worker_clone).await {
            NukeDecision::Nuke => self.nuke(polecat).await,
            NukeDecision::SkipDirty(reason) => {
                self.create_cleanup_item(polecat, "manual", Some(&reason.to_string()))
                    .await
            }
            NukeDecision::SkipUnverified => {
                self.create_cleanup_item(polecat, "manual", Some("not verified on main"))
                    .await
            }
        }
    }

    /// Recycle: the session ends, the worktree stays, the identity
    /// re-enters the pool as a gate waiter.
    async fn recycle(&self, polecat: &str) -> Result<(), WitnessError> {
        let session = self.session_for(polecat);
        if self.sessions.has_session(&session).await? {
            self.sessions.kill_session(&session).await?;
        }
        self.emit("polecat.recycled", polecat, serde_json::json!({}));
        Ok(())
    }

    async fn on_merged(&self, polecat: &str) -> Result<(), WitnessError> {
        let worker_clone = match self.manager.get(polecat).await {
            Ok(p) => p.clone_path,
            Err(ManagerError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let status = self.manager.cleanup_status(polecat).await;
        let verified = verify_commit_on_main(self.git.as_ref(), &worker_clone).await;

        match status {
            CleanupStatus::Clean => self.nuke(polecat).await,
            CleanupStatus::Unknown if verified => self.nuke(polecat).await,
            status if status.work_at_risk() => {
                // Do not nuke: escalate so a human recovers the work
                let subject = format!("RECOVERY_NEEDED {}/{polecat}", self.rig);
                let body = format!(
                    "Worker {polecat} was merged but reports {status}.\n\
                     The worktree was left in place; recover the work before teardown."
                );
                self.router
                    .send(
                        &self.address(),
                        &self.config.coordinator,
                        &subject,
                        &body,
                        SendOptions::at(self.clock.rfc3339()),
                    )
                    .await?;
                self.emit(
                    "recovery.needed",
                    polecat,
                    serde_json::json!({"status": status.to_string()}),
                );
                Ok(())
            }
            _ => {
                // Unknown and not on main: block the nuke, flag the wisp
                self.mark_cleanup_field(polecat, "stale_suspected", "true")
                    .await?;
                warn!(polecat, "nuke blocked: cleanup status unknown and HEAD not on main");
                Ok(())
            }
        }
    }

    async fn on_merge_failed(
        &self,
        polecat: &str,
        failure: FailureType,
        error: Option<&str>,
        conflict_files: &[String],
    ) -> Result<(), WitnessError> {
        let mut body = format!("Your merge failed ({failure}).\n");
        if let Some(error) = error {
            body.push_str(&format!("\n{error}\n"));
        }
        if !conflict_files.is_empty() {
            body.push_str(&format!("\nConflicting files: {}\n", conflict_files.join(", ")));
        }
        body.push_str("\nA resolution task has been filed if this was a conflict; otherwise fix and re-request the merge.");

        let to = format!("{}/{polecat}", self.rig);
        match self
            .router
            .send(
                &self.address(),
                &to,
                &format!("REWORK_REQUEST {polecat}"),
                &body,
                SendOptions::at(self.clock.rfc3339()),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(MailError::UnknownRecipient(_)) => {
                warn!(polecat, "merge-failed notice undeliverable; worker gone");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn on_help(&self, polecat: &str, topic: &str, detail: &str) -> Result<(), WitnessError> {
        match classify_help(topic) {
            HelpAction::AnswerLocally => {
                let to = format!("{}/{polecat}", self.rig);
                let body = format!(
                    "Topic: {topic}\n\n\
                     This looks informational. Check AGENTS.md in your clone root; \
                     tracker state is visible via the bd CLI.\n\n{detail}"
                );
                self.router
                    .send(
                        &self.address(),
                        &to,
                        &format!("Re: HELP {polecat}"),
                        &body,
                        SendOptions::at(self.clock.rfc3339()),
                    )
                    .await?;
            }
            HelpAction::Escalate => {
                let body = format!("Topic: {topic}\n\n{detail}");
                self.router
                    .send(
                        &self.address(),
                        &self.config.coordinator,
                        &format!("HELP {}/{polecat}", self.rig),
                        &body,
                        SendOptions::at(self.clock.rfc3339()),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Nuke: interrupt, brief grace, unconditional session kill, then
    /// remove worktree + branch + agent item and release the name.
    pub async fn nuke(&self, polecat: &str) -> Result<(), WitnessError> {
        let session = self.session_for(polecat);
        if self.sessions.has_session(&session).await? {
            let _ = self.sessions.send_interrupt(&session).await;
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = self.sessions.kill_session(&session).await;
        }

        let branch = self.manager.get(polecat).await.ok().map(|p| p.branch);
        self.manager.remove(polecat, true).await?;
        if let Some(branch) = branch {
            // The work branch in the shared repo goes too
            let repo = self.manager.town().mayor_rig(&self.rig);
            if let Err(err) = self.git.delete_branch(&repo, &branch).await {
                warn!(branch, error = %err, "branch delete during nuke failed");
            }
        }
        self.close_cleanup_items(polecat).await?;
        self.emit("polecat.nuked", polecat, serde_json::json!({}));
        info!(polecat, "nuked");
        Ok(())
    }

    /// Create (or refresh) the cleanup tracking item for a worker.
    async fn create_cleanup_item(
        &self,
        polecat: &str,
        state: &str,
        note: Option<&str>,
    ) -> Result<(), WitnessError> {
        let existing = self.find_cleanup_items(polecat).await?;
        if let Some(item) = existing.first() {
            let mut description =
                gt_core::fields::set_field(&item.description, "cleanup_state", state);
            if let Some(note) = note {
                description = gt_core::fields::set_field(&description, "note", note);
            }
            self.tracker
                .update(
                    &item.id,
                    UpdateRequest {
                        description: Some(description),
                        ..Default::default()
                    },
                )
                .await?;
            return Ok(());
        }

        let mut description = format!(
            "cleanup_state: {state}\nworker: {}/{polecat}",
            self.rig
        );
        if let Some(note) = note {
            description.push_str(&format!("\nnote: {note}"));
        }
        self.tracker
            .create(CreateRequest {
                title: format!("cleanup {}/{polecat}", self.rig),
                issue_type: Some(IssueType::Task),
                description: Some(description),
                labels: vec!["cleanup".to_string(), self.cleanup_label(polecat)],
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn find_cleanup_items(
        &self,
        polecat: &str,
    ) -> Result<Vec<gt_core::issue::WorkItem>, WitnessError> {
        Ok(self
            .tracker
            .list(ListFilter {
                label: Some(self.cleanup_label(polecat)),
                status: Some(IssueStatus::Open),
                ..Default::default()
            })
            .await?)
    }

    async fn mark_cleanup_field(
        &self,
        polecat: &str,
        key: &str,
        value: &str,
    ) -> Result<(), WitnessError> {
        for item in self.find_cleanup_items(polecat).await? {
            self.tracker
                .update(
                    &item.id,
                    UpdateRequest {
                        description: Some(gt_core::fields::set_field(&item.description, key, value)),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Ok(())
    }

    async fn close_cleanup_items(&self, polecat: &str) -> Result<(), WitnessError> {
        for item in self.find_cleanup_items(polecat).await? {
            self.tracker.close(&item.id, Some("worker nuked")).await?;
        }
        Ok(())
    }

    fn emit(&self, event_type: &str, polecat: &str, payload: serde_json::Value) {
        if let Some(events) = &self.events {
            let record = gt_core::event::EventRecord::new(
                self.clock.rfc3339(),
                event_type,
                format!("{}/{polecat}", self.rig),
                payload,
                gt_core::event::Visibility::Both,
            );
            if let Err(err) = events.append(&record) {
                warn!(error = %err, "event append failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
