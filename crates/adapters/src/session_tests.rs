// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn fake_lifecycle() {
    let sessions = FakeSessions::new();
    sessions.spawn("gt-gt-toast", 1_000, &[42]);

    assert!(sessions.has_session("gt-gt-toast").await.unwrap());
    assert_eq!(sessions.pane_pids("gt-gt-toast").await.unwrap(), vec![42]);
    assert_eq!(
        sessions.created_at_epoch("gt-gt-toast").await.unwrap(),
        1_000
    );

    sessions.kill_session("gt-gt-toast").await.unwrap();
    assert!(!sessions.has_session("gt-gt-toast").await.unwrap());
    assert_eq!(sessions.killed(), vec!["gt-gt-toast"]);
}

#[tokio::test]
async fn fake_records_keys_and_interrupts() {
    let sessions = FakeSessions::new();
    sessions.spawn("gt-gt-nux", 0, &[]);
    sessions.send_keys("gt-gt-nux", "echo hi").await.unwrap();
    sessions.send_interrupt("gt-gt-nux").await.unwrap();
    assert_eq!(sessions.keys_sent_to("gt-gt-nux"), vec!["echo hi"]);
    assert_eq!(sessions.interrupts_sent_to("gt-gt-nux"), 1);
}

#[tokio::test]
async fn fake_send_to_missing_session_is_not_found() {
    let sessions = FakeSessions::new();
    let err = sessions.send_keys("nope", "x").await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[test]
fn session_list_format_parses_names_with_colons() {
    // tmux emits `#{session_name}:#{session_id}`; names may themselves
    // contain colons, so the split is on the last colon.
    let line = "gt:rig:one:$7";
    let (name, id) = line.rsplit_once(':').unwrap();
    assert_eq!(name, "gt:rig:one");
    assert_eq!(id, "$7");
}
