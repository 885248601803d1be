// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: cleanup gated on git state.
//!
//! Worker ghost is merged but reports unpushed work. The witness
//! refuses the nuke and escalates RECOVERY_NEEDED; once the status
//! turns clean the next MERGED triggers the teardown.

use crate::prelude::*;

fn merged_msg(worker: &str, ts: &str) -> Message {
    Message::new(
        "gt/refinery",
        "gt/witness",
        format!("MERGED {worker}"),
        format!("Polecat: {worker}\nRig: gt\nBranch: b\nTarget: main\nMerged-At: {ts}"),
        ts,
    )
}

#[tokio::test]
async fn unpushed_work_blocks_nuke_until_clean() {
    let t = Town::new().await;
    let worker = t.spawn_worker("gt-ghost").await;
    assert_eq!(worker.name, "toast");
    t.set_cleanup_status("toast", "has_unpushed").await;

    t.store
        .append("gt/witness", &merged_msg("toast", "2026-02-01T10:00:00+00:00"))
        .await
        .unwrap();
    t.witness.process_mailbox().await.unwrap();

    // No nuke; the coordinator hears RECOVERY_NEEDED
    assert!(t.town.polecat_dir(RIG, "toast").exists());
    let mayor = t.store.list("mayor").await.unwrap();
    assert_eq!(mayor.len(), 1);
    assert_eq!(mayor[0].subject, "RECOVERY_NEEDED gt/toast");
    assert!(mayor[0].body.contains("has_unpushed"));

    // Work recovered: status flips to clean, next MERGED nukes
    t.set_cleanup_status("toast", "clean").await;
    t.store
        .append("gt/witness", &merged_msg("toast", "2026-02-01T11:00:00+00:00"))
        .await
        .unwrap();
    t.witness.process_mailbox().await.unwrap();

    assert!(!t.town.polecat_dir(RIG, "toast").exists());
    // Identity item closed along with the teardown
    let agent = t
        .tracker
        .show(&BeadId::new("gt-agent-toast"))
        .await
        .unwrap();
    assert!(agent.status.is_closed());
}
