// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: conflict → delegation.
//!
//! Two workers target main; the first merges cleanly, the second hits
//! conflicts and is blocked on a boosted resolution task. Closing the
//! task puts the request back on the ready front and it merges.

use crate::prelude::*;

#[tokio::test]
async fn second_merge_conflicts_then_recovers() {
    let t = Town::new().await;
    let cancel = CancellationToken::new();

    let toast = t.spawn_worker("gt-one").await;
    let nux = t.spawn_worker("gt-two").await;
    t.worker_done(&toast, "gt-mr-first").await;
    t.worker_done(&nux, "gt-mr-second").await;

    // First merges cleanly
    t.git.clear_conflicts();
    t.git.set_conflict(&nux.branch, "main", &["a.go", "b.go"]);
    let first = t.refinery.process_next(&cancel).await.unwrap();
    let second = t.refinery.process_next(&cancel).await.unwrap();

    let processed: Vec<PassOutcome> = vec![first, second];
    assert!(processed.contains(&PassOutcome::Processed(BeadId::new("gt-mr-first"))));
    assert!(processed.contains(&PassOutcome::Processed(BeadId::new("gt-mr-second"))));
    assert!(t
        .tracker
        .show(&BeadId::new("gt-mr-first"))
        .await
        .unwrap()
        .status
        .is_closed());

    // The second is blocked on a conflict task with boosted priority
    let mr = t.tracker.show(&BeadId::new("gt-mr-second")).await.unwrap();
    assert!(!mr.is_ready());
    let task = t
        .tracker
        .all()
        .into_iter()
        .find(|i| i.title.starts_with("Resolve merge conflict"))
        .expect("conflict task filed");
    assert_eq!(task.priority, gt_core::issue::Priority(1));
    assert!(task.description.contains("Conflict-Files: a.go, b.go"));
    assert!(task.description.contains("git rebase origin/main"));

    // Witness heard MERGE_FAILED / conflict for nux
    let failed = t
        .witness_inbox()
        .await
        .into_iter()
        .find(|m| m.subject == "MERGE_FAILED nux")
        .expect("witness notified");
    assert!(failed.body.contains("Failure-Type: conflict"));

    // Queue continues: nothing ready, refinery idles rather than
    // wedging on the blocked request
    assert_eq!(
        t.refinery.process_next(&cancel).await.unwrap(),
        PassOutcome::Idle
    );

    // A new worker resolves the conflict and closes the task
    t.git.clear_conflicts();
    t.tracker.close(&task.id, Some("rebased")).await.unwrap();

    // The request re-enters the ready front and merges
    let outcome = t.refinery.process_next(&cancel).await.unwrap();
    assert_eq!(outcome, PassOutcome::Processed(BeadId::new("gt-mr-second")));
    assert!(t
        .tracker
        .show(&BeadId::new("gt-mr-second"))
        .await
        .unwrap()
        .status
        .is_closed());
}
