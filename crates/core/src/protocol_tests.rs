// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    merge_ready = { "MERGE_READY toast", Some(MessageKind::MergeReady) },
    merged      = { "MERGED toast", Some(MessageKind::Merged) },
    failed      = { "MERGE_FAILED toast", Some(MessageKind::MergeFailed) },
    rework      = { "REWORK_REQUEST toast", Some(MessageKind::ReworkRequest) },
    done        = { "POLECAT_DONE toast", Some(MessageKind::PolecatDone) },
    done_legacy = { "polecat_done toast", Some(MessageKind::PolecatDone) },
    started     = { "POLECAT_STARTED toast", Some(MessageKind::PolecatStarted) },
    shutdown    = { "LIFECYCLE:Shutdown toast", Some(MessageKind::LifecycleShutdown) },
    help        = { "HELP toast", Some(MessageKind::Help) },
    chat        = { "lunch plans", None },
    partial     = { "MERGEDx toast", None },
)]
fn subject_token_dispatch(subject: &str, expected: Option<MessageKind>) {
    assert_eq!(parse_message_type(subject), expected);
}

#[test]
fn extract_polecat_takes_rest_of_subject() {
    assert_eq!(extract_polecat("MERGED toast"), Some("toast"));
    assert_eq!(extract_polecat("RECOVERY_NEEDED gt/toast"), Some("gt/toast"));
    assert_eq!(extract_polecat("NUDGE"), None);
}

#[test]
fn merged_roundtrip() {
    let msg = ProtocolMessage::Merged {
        polecat: "toast".into(),
        rig: "gt".into(),
        branch: "polecat/toast/gt-abc@1700".into(),
        target: "main".into(),
        merged_at: "2026-01-01T00:00:00+00:00".into(),
        merge_commit: Some("abc1234def".into()),
    };
    let parsed = ProtocolMessage::parse(&msg.subject(), &msg.body()).unwrap();
    assert_eq!(parsed, msg);
}

#[test]
fn merge_failed_roundtrip_with_conflict_files() {
    let msg = ProtocolMessage::MergeFailed {
        polecat: "nux".into(),
        rig: "gt".into(),
        branch: "polecat/nux-1700".into(),
        failed_at: "2026-01-01T00:00:00+00:00".into(),
        failure_type: FailureType::Conflict,
        error: Some("merge conflict in 2 files".into()),
        conflict_files: vec!["a.go".into(), "b.go".into()],
    };
    let parsed = ProtocolMessage::parse(&msg.subject(), &msg.body()).unwrap();
    assert_eq!(parsed, msg);
}

#[test]
fn polecat_done_roundtrip() {
    let msg = ProtocolMessage::PolecatDone {
        polecat: "toast".into(),
        rig: "gt".into(),
        status: DoneStatus::Escalated,
        merge_request: Some(BeadId::new("gt-mr-ab12cd")),
    };
    let parsed = ProtocolMessage::parse(&msg.subject(), &msg.body()).unwrap();
    assert_eq!(parsed, msg);
}

#[test]
fn rework_request_carries_free_text() {
    let msg = ProtocolMessage::ReworkRequest {
        polecat: "toast".into(),
        rig: "gt".into(),
        branch: "polecat/toast-1700".into(),
        requested_at: "2026-01-01T00:00:00+00:00".into(),
        reason: "Tests regressed on main.\nPlease rebase and re-run.".into(),
    };
    let parsed = ProtocolMessage::parse(&msg.subject(), &msg.body()).unwrap();
    assert_eq!(parsed, msg);
}

#[test]
fn help_topic_and_detail() {
    let msg = ProtocolMessage::Help {
        polecat: "slit".into(),
        rig: "gt".into(),
        topic: "stuck-rebase".into(),
        detail: "rebase keeps failing on vendored deps".into(),
    };
    let parsed = ProtocolMessage::parse(&msg.subject(), &msg.body()).unwrap();
    assert_eq!(parsed, msg);
}

#[test]
fn non_protocol_subject_passes_through() {
    assert_eq!(ProtocolMessage::parse("hello world", "body"), None);
}

#[test]
fn polecat_falls_back_to_subject_when_body_lacks_field() {
    let parsed = ProtocolMessage::parse("POLECAT_DONE toast", "Status: COMPLETED").unwrap();
    assert_eq!(parsed.polecat(), "toast");
}

#[yare::parameterized(
    conflict = { "conflict", Some(FailureType::Conflict) },
    tests    = { "tests", Some(FailureType::Tests) },
    build    = { "Build", Some(FailureType::Build) },
    other    = { "wat", None },
)]
fn failure_type_parse(input: &str, expected: Option<FailureType>) {
    assert_eq!(FailureType::parse(input), expected);
}

#[yare::parameterized(
    completed = { "COMPLETED", Some(DoneStatus::Completed) },
    escalated = { "escalated", Some(DoneStatus::Escalated) },
    deferred  = { "DEFERRED", Some(DoneStatus::Deferred) },
    phase     = { "PHASE_COMPLETE", Some(DoneStatus::PhaseComplete) },
    other     = { "nope", None },
)]
fn done_status_parse(input: &str, expected: Option<DoneStatus>) {
    assert_eq!(DoneStatus::parse(input), expected);
}
