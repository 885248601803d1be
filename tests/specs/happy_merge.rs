// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: the happy merge.
//!
//! Worker finishes, refinery claims and squash-merges, witness audits
//! and nukes the clean worker, releasing the name.

use crate::prelude::*;

#[tokio::test]
async fn worker_to_merged_to_nuked() {
    let t = Town::new().await;

    // Worker toast picks up gt-abc and produces a branch
    let toast = t.spawn_worker("gt-abc").await;
    assert_eq!(toast.name, "toast");
    assert!(toast.branch.starts_with("polecat/toast/abc@"));

    // Done: merge request filed, witness hears POLECAT_DONE
    t.worker_done(&toast, "gt-mr-ab12cd").await;
    t.witness.process_mailbox().await.unwrap();

    // The witness tracked the pending MR but left the worker alone
    assert!(t.town.polecat_dir(RIG, "toast").exists());

    // Refinery polls, claims, merges, pushes
    let cancel = CancellationToken::new();
    let outcome = t.refinery.process_next(&cancel).await.unwrap();
    assert_eq!(outcome, PassOutcome::Processed(BeadId::new("gt-mr-ab12cd")));

    let mr = t.tracker.show(&BeadId::new("gt-mr-ab12cd")).await.unwrap();
    assert!(mr.status.is_closed());
    let fields = MergeRequestFields::from_description(&mr.description);
    assert_eq!(fields.close_reason.as_deref(), Some("merged"));
    let commit = fields.merge_commit.expect("merge commit recorded");

    // Source issue closed with the MR reference
    let source = t.tracker.show(&BeadId::new("gt-abc")).await.unwrap();
    assert!(source.status.is_closed());
    assert_eq!(source.field("Close-Reason"), Some("Merged in gt-mr-ab12cd"));

    // Witness hears MERGED; worker is clean and HEAD is on main
    t.set_cleanup_status("toast", "clean").await;
    t.git.set_ancestor(
        &t.git
            .rev_parse(std::path::Path::new("/"), "HEAD")
            .await
            .unwrap(),
        "origin/main",
    );
    t.sessions.spawn("gt-gt-toast", 0, &[]);
    t.witness.process_mailbox().await.unwrap();

    // Nuked: session killed, worktree removed, name released
    assert!(t.sessions.killed().contains(&"gt-gt-toast".to_string()));
    assert!(!t.town.polecat_dir(RIG, "toast").exists());
    assert_eq!(t.manager.pool().lock().allocate().unwrap(), "toast");

    // The merge commit really is the pushed HEAD
    assert_eq!(commit.len(), 40);
    assert_eq!(
        t.git.pushes(),
        vec![("origin".to_string(), "main".to_string())]
    );
}
