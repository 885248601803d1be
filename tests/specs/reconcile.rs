// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: reconciliation with orphan sessions.
//!
//! Dirs {toast, capable}, sessions {toast, nux, slit}: the orphan
//! sessions die, the directory set wins, and allocation skips the
//! first three reserved pool slots to land on furiosa.

use crate::prelude::*;

#[tokio::test]
async fn orphan_sessions_die_and_allocation_skips_reserved() {
    let t = Town::new().await;

    for name in ["toast", "capable"] {
        std::fs::create_dir_all(t.town.polecat_dir(RIG, name)).unwrap();
    }
    for name in ["toast", "nux", "slit"] {
        t.sessions.spawn(&format!("gt-gt-{name}"), 0, &[]);
    }

    let outcome = t.manager.reconcile().await.unwrap();

    // nux and slit had sessions but no directories: killed
    let killed: Vec<&str> = outcome.kill_sessions.iter().map(|n| n.as_str()).collect();
    assert_eq!(killed, vec!["nux", "slit"]);
    assert_eq!(t.sessions.killed(), vec!["gt-gt-nux", "gt-gt-slit"]);

    // Directory set is authoritative
    let active: Vec<String> = t
        .manager
        .pool()
        .lock()
        .active_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(active, vec!["capable", "toast"]);

    // Pool order is toast, nux, capable, furiosa, ...: the first three
    // are reserved (two in use, one quarantined), so furiosa is next
    assert_eq!(t.manager.pool().lock().allocate().unwrap(), "furiosa");
}
