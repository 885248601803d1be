// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared town fixture for the scenario specs.

pub use gt_adapters::git::GitAdapter;
pub use gt_adapters::tracker::{CreateRequest, TrackerAdapter, UpdateRequest};
pub use gt_adapters::{FakeGit, FakeSessions, FakeTracker};
pub use gt_core::clock::{Clock, FakeClock};
pub use gt_core::issue::{BeadId, IssueStatus, IssueType, WorkItem};
pub use gt_core::merge_request::MergeRequestFields;
pub use gt_core::message::Message;
pub use gt_core::polecat::RigName;
pub use gt_engine::polecats::{AddOptions, Manager};
pub use gt_engine::refinery::{PassOutcome, Refinery, RefineryConfig};
pub use gt_engine::town::TownPaths;
pub use gt_engine::witness::{Witness, WitnessConfig};
pub use gt_mail::channels::MessagingConfig;
pub use gt_mail::router::{Router, SendOptions};
pub use gt_mail::store::{JsonlMailbox, MailboxStore};
pub use std::sync::Arc;
pub use tokio_util::sync::CancellationToken;

pub const RIG: &str = "gt";

pub struct Town {
    pub town: TownPaths,
    pub tracker: FakeTracker,
    pub git: FakeGit,
    pub sessions: FakeSessions,
    pub store: Arc<JsonlMailbox>,
    pub router: Arc<Router>,
    pub clock: FakeClock,
    pub manager: Arc<Manager<FakeClock>>,
    pub refinery: Refinery<FakeClock>,
    pub witness: Witness<FakeClock>,
    _tmp: tempfile::TempDir,
}

impl Town {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let town = TownPaths::new(tmp.path());
        std::fs::create_dir_all(town.mayor_rig(RIG)).unwrap();

        let tracker = FakeTracker::new();
        let git = FakeGit::new();
        let sessions = FakeSessions::new();
        let store = Arc::new(JsonlMailbox::new(town.mail_root()));
        let clock = FakeClock::new();

        // Role identities so the bus can validate recipients
        for (id, address) in [
            ("gt-agent-witness", "gt/witness"),
            ("gt-agent-refinery", "gt/refinery"),
            ("town-agent-mayor", "mayor"),
        ] {
            tracker
                .create(CreateRequest {
                    title: address.to_string(),
                    issue_type: Some(IssueType::AgentIdentity),
                    description: Some(format!("address: {address}")),
                    id: Some(BeadId::new(id)),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let router = Arc::new(Router::new(
            store.clone(),
            Arc::new(tracker.clone()),
            MessagingConfig::default(),
        ));
        let manager = Arc::new(Manager::new(
            town.clone(),
            RigName::new(RIG),
            Arc::new(git.clone()),
            Arc::new(tracker.clone()),
            Arc::new(sessions.clone()),
            clock.clone(),
        ));
        let refinery = Refinery::new(
            town.clone(),
            RIG,
            RefineryConfig::default(),
            Arc::new(git.clone()),
            Arc::new(tracker.clone()),
            router.clone(),
            clock.clone(),
        );
        let witness = Witness::new(
            RIG,
            WitnessConfig::default(),
            Arc::new(git.clone()),
            Arc::new(tracker.clone()),
            Arc::new(sessions.clone()),
            store.clone(),
            router.clone(),
            manager.clone(),
            clock.clone(),
        );

        Self {
            town,
            tracker,
            git,
            sessions,
            store,
            router,
            clock,
            manager,
            refinery,
            witness,
            _tmp: tmp,
        }
    }

    /// Provision a worker assigned to `issue` (creating the issue).
    pub async fn spawn_worker(&self, issue: &str) -> gt_core::polecat::Polecat {
        self.tracker
            .create(CreateRequest {
                title: format!("work {issue}"),
                id: Some(BeadId::new(issue)),
                ..Default::default()
            })
            .await
            .unwrap();
        self.manager
            .add(AddOptions {
                work_item: Some(BeadId::new(issue)),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    /// The worker finishes: it files a merge request and mails
    /// POLECAT_DONE to the witness.
    pub async fn worker_done(&self, polecat: &gt_core::polecat::Polecat, mr_id: &str) {
        let fields = MergeRequestFields {
            branch: Some(polecat.branch.clone()),
            target: Some("main".to_string()),
            source_issue: polecat.work_item.clone(),
            worker: Some(polecat.name.to_string()),
            rig: Some(RIG.to_string()),
            agent_bead: Some(BeadId::new(format!("gt-agent-{}", polecat.name))),
            ..Default::default()
        };
        self.tracker
            .create(CreateRequest {
                title: format!("merge {}", polecat.branch),
                issue_type: Some(IssueType::MergeRequest),
                description: Some(fields.render("Ready to merge.")),
                id: Some(BeadId::new(mr_id)),
                ..Default::default()
            })
            .await
            .unwrap();

        self.router
            .send(
                &format!("{RIG}/polecats/{}", polecat.name),
                &format!("{RIG}/witness"),
                &format!("POLECAT_DONE {}", polecat.name),
                &format!(
                    "Polecat: {}\nRig: {RIG}\nStatus: COMPLETED\nMerge-Request: {mr_id}",
                    polecat.name
                ),
                SendOptions::at(self.clock.rfc3339()),
            )
            .await
            .unwrap();
    }

    /// Write the worker's self-reported cleanup status.
    pub async fn set_cleanup_status(&self, worker: &str, status: &str) {
        let bead = BeadId::new(format!("gt-agent-{worker}"));
        let item = self.tracker.show(&bead).await.unwrap();
        self.tracker
            .update(
                &bead,
                UpdateRequest {
                    description: Some(gt_core::fields::set_field(
                        &item.description,
                        "cleanup_status",
                        status,
                    )),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    pub async fn witness_inbox(&self) -> Vec<Message> {
        self.store.list("gt/witness").await.unwrap()
    }
}
