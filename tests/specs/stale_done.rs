// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: a stale POLECAT_DONE from a prior incarnation.
//!
//! Worker nux starts at T0, crashes, and is re-spawned at T2. A
//! POLECAT_DONE stamped T1 arrives at T3; the session was created at
//! T2 > T1, so the witness drops it.

use crate::prelude::*;

#[tokio::test]
async fn done_from_previous_incarnation_is_dropped() {
    let t = Town::new().await;
    // Allocate toast (pool order) then nux
    t.spawn_worker("gt-x").await;
    let nux = t.spawn_worker("gt-y").await;
    assert_eq!(nux.name, "nux");
    t.set_cleanup_status("nux", "clean").await;

    // Re-spawned session at T2
    let t2 = chrono::DateTime::parse_from_rfc3339("2026-02-01T12:00:00+00:00")
        .unwrap()
        .timestamp();
    t.sessions.spawn("gt-gt-nux", t2, &[]);

    // POLECAT_DONE stamped T1 < T2
    t.store
        .append(
            "gt/witness",
            &Message::new(
                "gt/polecats/nux",
                "gt/witness",
                "POLECAT_DONE nux",
                "Polecat: nux\nRig: gt\nStatus: COMPLETED",
                "2026-02-01T11:00:00+00:00",
            ),
        )
        .await
        .unwrap();

    let handled = t.witness.process_mailbox().await.unwrap();
    assert_eq!(handled, 1);

    // Dropped: the live worker was not torn down
    assert!(t.town.polecat_dir(RIG, "nux").exists());
    assert!(t.sessions.killed().is_empty());

    // A fresh POLECAT_DONE stamped after T2 is honored
    t.store
        .append(
            "gt/witness",
            &Message::new(
                "gt/polecats/nux",
                "gt/witness",
                "POLECAT_DONE nux",
                "Polecat: nux\nRig: gt\nStatus: COMPLETED",
                "2026-02-01T13:00:00+00:00",
            ),
        )
        .await
        .unwrap();
    t.witness.process_mailbox().await.unwrap();
    assert!(!t.town.polecat_dir(RIG, "nux").exists());
}
