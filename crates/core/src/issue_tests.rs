// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    task  = { IssueType::Task, "\"task\"" },
    mr    = { IssueType::MergeRequest, "\"merge-request\"" },
    agent = { IssueType::AgentIdentity, "\"agent-identity\"" },
    slot  = { IssueType::Slot, "\"slot\"" },
)]
fn issue_type_serde(ty: IssueType, json: &str) {
    assert_eq!(serde_json::to_string(&ty).unwrap(), json);
    let parsed: IssueType = serde_json::from_str(json).unwrap();
    assert_eq!(parsed, ty);
}

#[test]
fn status_serde_snake_case() {
    assert_eq!(
        serde_json::to_string(&IssueStatus::InProgress).unwrap(),
        "\"in_progress\""
    );
}

#[yare::parameterized(
    p0 = { 0, 0 },
    p2 = { 2, 1 },
    p4 = { 4, 3 },
)]
fn priority_boost_floors_at_zero(input: u8, boosted: u8) {
    assert_eq!(Priority(input).boosted(), Priority(boosted));
}

#[test]
fn priority_clamps() {
    assert_eq!(Priority::clamped(9), Priority::LOWEST);
}

#[test]
fn bead_id_tail() {
    assert_eq!(BeadId::new("gt-mr-ab12cd").tail(), "ab12cd");
    assert_eq!(BeadId::new("abc").tail(), "abc");
}

#[test]
fn work_item_ready_requires_open_and_unblocked() {
    let mut item: WorkItem = serde_json::from_value(serde_json::json!({
        "id": "gt-1",
        "type": "task",
        "status": "open",
    }))
    .unwrap();
    assert!(item.is_ready());
    assert_eq!(item.priority, Priority::DEFAULT);

    item.blocked_by.push(BeadId::new("gt-2"));
    assert!(!item.is_ready());

    item.blocked_by.clear();
    item.status = IssueStatus::Closed;
    assert!(!item.is_ready());
}

#[test]
fn work_item_field_lookup() {
    let item: WorkItem = serde_json::from_value(serde_json::json!({
        "id": "gt-1",
        "type": "agent-identity",
        "status": "open",
        "description": "cleanup_status: clean\nactive_mr: gt-mr-1",
    }))
    .unwrap();
    assert_eq!(item.field("cleanup_status"), Some("clean"));
    assert_eq!(item.field("active_mr"), Some("gt-mr-1"));
}
