// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::town::TownPaths;
use gt_adapters::{FakeGit, FakeSessions, FakeTracker};
use gt_core::clock::FakeClock;
use gt_core::issue::IssueType;

struct Fixture {
    manager: Manager<FakeClock>,
    tracker: FakeTracker,
    sessions: FakeSessions,
    town: TownPaths,
    _tmp: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let town = TownPaths::new(tmp.path());
    std::fs::create_dir_all(town.mayor_rig("gt")).unwrap();
    let tracker = FakeTracker::new();
    let sessions = FakeSessions::new();
    let manager = Manager::new(
        town.clone(),
        RigName::new("gt"),
        Arc::new(FakeGit::new()),
        Arc::new(tracker.clone()),
        Arc::new(sessions.clone()),
        FakeClock::new(),
    );
    Fixture {
        manager,
        tracker,
        sessions,
        town,
        _tmp: tmp,
    }
}

#[tokio::test]
async fn add_provisions_worktree_meta_and_agent_bead() {
    let f = fixture();
    let polecat = f.manager.add(AddOptions::default()).await.unwrap();

    // Pool order: first name is toast
    assert_eq!(polecat.name, "toast");
    assert!(polecat.clone_path.ends_with("gt/polecats/toast"));
    assert!(polecat.branch.starts_with("polecat/toast-"));

    // Metadata persisted inside the clone
    let meta = polecat.clone_path.join(".runtime/polecat.json");
    assert!(meta.exists());

    // Agent identity registered for mail routing
    let bead = f
        .tracker
        .show(&BeadId::new("gt-agent-toast"))
        .await
        .unwrap();
    assert_eq!(bead.issue_type, IssueType::AgentIdentity);
    assert_eq!(bead.field("address"), Some("gt/polecats/toast"));
}

#[tokio::test]
async fn add_with_issue_uses_issue_template() {
    let f = fixture();
    let polecat = f
        .manager
        .add(AddOptions {
            work_item: Some(BeadId::new("gt-abc")),
            ..Default::default()
        })
        .await
        .unwrap();
    // polecat/{name}/{issue}@{timestamp}
    assert!(
        polecat.branch.starts_with("polecat/toast/abc@"),
        "branch was {}",
        polecat.branch
    );
}

#[test]
fn branch_template_variables() {
    let f = fixture();
    let branch = f.manager.build_branch_name(
        "nux",
        Some(&BeadId::new("gt-123")),
        Some("{user}/{rig}/{name}/{issue}-{year}"),
    );
    let user = std::env::var("USER").unwrap_or_else(|_| "gt".to_string());
    assert!(branch.starts_with(&format!("{user}/gt/nux/123-")));
}

#[tokio::test]
async fn add_twice_fails_and_releases_nothing() {
    let f = fixture();
    let first = f.manager.add(AddOptions::default()).await.unwrap();
    // Seed a colliding directory for the next pool name
    std::fs::create_dir_all(f.town.polecat_dir("gt", "nux")).unwrap();
    let err = f
        .manager
        .add_named(&PolecatName::new("nux"), AddOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::AlreadyExists { .. }));
    // First worker unaffected
    assert!(first.clone_path.exists());
}

#[tokio::test]
async fn gitignore_gains_required_patterns() {
    let f = fixture();
    let polecat = f.manager.add(AddOptions::default()).await.unwrap();
    let gitignore = std::fs::read_to_string(polecat.clone_path.join(".gitignore")).unwrap();
    for pattern in [".runtime/", ".claude/", ".beads/", ".logs/"] {
        assert!(gitignore.contains(pattern), "missing {pattern}");
    }
}

#[tokio::test]
async fn overlay_files_copied_without_overwrite() {
    let f = fixture();
    let overlay = f.town.overlay_dir("gt");
    std::fs::create_dir_all(&overlay).unwrap();
    std::fs::write(overlay.join("AGENTS.md"), "guide").unwrap();
    std::fs::write(overlay.join("notes.txt"), "notes").unwrap();

    let polecat = f.manager.add(AddOptions::default()).await.unwrap();
    assert_eq!(
        std::fs::read_to_string(polecat.clone_path.join("AGENTS.md")).unwrap(),
        "guide"
    );
    assert_eq!(
        std::fs::read_to_string(polecat.clone_path.join("notes.txt")).unwrap(),
        "notes"
    );
}

#[tokio::test]
async fn get_derives_state_from_tracker_and_defaults_to_working() {
    let f = fixture();
    f.manager.add(AddOptions::default()).await.unwrap();

    // Tracker says done
    let bead = BeadId::new("gt-agent-toast");
    let item = f.tracker.show(&bead).await.unwrap();
    f.tracker
        .update(
            &bead,
            UpdateRequest {
                description: Some(gt_core::fields::set_field(
                    &item.description,
                    "state",
                    "done",
                )),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        f.manager.get("toast").await.unwrap().state,
        PolecatState::Done
    );

    // Legacy value reads as Working
    f.tracker
        .update(
            &bead,
            UpdateRequest {
                description: Some("address: gt/polecats/toast\nstate: active".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        f.manager.get("toast").await.unwrap().state,
        PolecatState::Working
    );
}

#[tokio::test]
async fn list_skips_hidden_dirs() {
    let f = fixture();
    f.manager.add(AddOptions::default()).await.unwrap();
    std::fs::create_dir_all(f.town.polecats_dir("gt").join(".claude")).unwrap();

    let workers = f.manager.list().await.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].name, "toast");
}

#[tokio::test]
async fn remove_refuses_dirty_worker_without_force() {
    let f = fixture();
    f.manager.add(AddOptions::default()).await.unwrap();

    let bead = BeadId::new("gt-agent-toast");
    let item = f.tracker.show(&bead).await.unwrap();
    f.tracker
        .update(
            &bead,
            UpdateRequest {
                description: Some(gt_core::fields::set_field(
                    &item.description,
                    "cleanup_status",
                    "has_unpushed",
                )),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = f.manager.remove("toast", false).await.unwrap_err();
    assert!(matches!(err, ManagerError::NotClean { .. }));

    // Force overrides
    f.manager.remove("toast", true).await.unwrap();
    assert!(!f.town.polecat_dir("gt", "toast").exists());
}

#[tokio::test]
async fn remove_kills_session_and_releases_name() {
    let f = fixture();
    f.manager.add(AddOptions::default()).await.unwrap();
    f.sessions.spawn("gt-gt-toast", 0, &[]);

    f.manager.remove("toast", false).await.unwrap();
    assert_eq!(f.sessions.killed(), vec!["gt-gt-toast"]);

    // Name returns to the pool: next add gets toast again
    let next = f.manager.add(AddOptions::default()).await.unwrap();
    assert_eq!(next.name, "toast");
}
