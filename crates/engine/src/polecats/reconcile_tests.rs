// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::polecats::{AddOptions, Manager};
use crate::town::TownPaths;
use gt_adapters::{FakeGit, FakeSessions, FakeTracker};
use gt_core::clock::FakeClock;
use gt_core::polecat::RigName;
use std::sync::Arc;

fn manager(tmp: &tempfile::TempDir, sessions: &FakeSessions) -> Manager<FakeClock> {
    let town = TownPaths::new(tmp.path());
    std::fs::create_dir_all(town.mayor_rig("gt")).unwrap();
    Manager::new(
        town,
        RigName::new("gt"),
        Arc::new(FakeGit::new()),
        Arc::new(FakeTracker::new()),
        Arc::new(sessions.clone()),
        FakeClock::new(),
    )
}

#[tokio::test]
async fn orphan_sessions_are_killed_and_dirs_win() {
    let tmp = tempfile::tempdir().unwrap();
    let sessions = FakeSessions::new();
    let manager = manager(&tmp, &sessions);

    // Dirs: toast, capable. Sessions: toast, nux, slit.
    for name in ["toast", "capable"] {
        std::fs::create_dir_all(tmp.path().join("gt/polecats").join(name)).unwrap();
    }
    for name in ["toast", "nux", "slit"] {
        sessions.spawn(&format!("gt-gt-{name}"), 0, &[]);
    }

    let outcome = manager.reconcile().await.unwrap();

    let killed: Vec<&str> = outcome.kill_sessions.iter().map(|n| n.as_str()).collect();
    assert_eq!(killed, vec!["nux", "slit"]);
    assert_eq!(sessions.killed(), vec!["gt-gt-nux", "gt-gt-slit"]);

    let active: Vec<String> = manager
        .pool()
        .lock()
        .active_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(active, vec!["capable", "toast"]);

    // toast, nux, capable occupy the first three pool slots (two in
    // use, one quarantined until its kill is confirmed); allocation
    // skips all three.
    assert_eq!(manager.pool().lock().allocate().unwrap(), "furiosa");
}

#[tokio::test]
async fn role_and_crew_sessions_are_not_pool_candidates() {
    let tmp = tempfile::tempdir().unwrap();
    let sessions = FakeSessions::new();
    let manager = manager(&tmp, &sessions);

    sessions.spawn("gt-gt-witness", 0, &[]);
    sessions.spawn("gt-gt-refinery", 0, &[]);
    sessions.spawn("gt-gt-crew-ace", 0, &[]);
    sessions.spawn("gt-other-toast", 0, &[]);

    let outcome = manager.reconcile().await.unwrap();
    assert!(outcome.kill_sessions.is_empty());
    assert!(sessions.killed().is_empty());
}

#[tokio::test]
async fn reconcile_after_add_sees_worker_between_sessions() {
    let tmp = tempfile::tempdir().unwrap();
    let sessions = FakeSessions::new();
    let manager = manager(&tmp, &sessions);

    manager.add(AddOptions::default()).await.unwrap();
    // No session running: the worker is between sessions, still in use
    manager.reconcile().await.unwrap();
    let active = manager.pool().lock().active_names();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0], "toast");
}
