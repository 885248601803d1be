// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_core::issue::{IssueStatus, IssueType, Priority};

#[tokio::test]
async fn create_show_roundtrip() {
    let tracker = FakeTracker::new();
    let id = tracker
        .create(CreateRequest {
            title: "fix auth".into(),
            issue_type: Some(IssueType::Task),
            priority: Some(Priority(1)),
            description: Some("Branch: b".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let item = tracker.show(&id).await.unwrap();
    assert_eq!(item.title, "fix auth");
    assert_eq!(item.priority, Priority(1));
    assert_eq!(item.field("Branch"), Some("b"));
}

#[tokio::test]
async fn id_override_conflicts_without_force() {
    let tracker = FakeTracker::new();
    let req = CreateRequest {
        title: "slot".into(),
        id: Some(BeadId::new("gt-slot-main")),
        ..Default::default()
    };
    tracker.create(req.clone()).await.unwrap();
    assert!(tracker.create(req.clone()).await.is_err());
    tracker
        .create(CreateRequest {
            force: true,
            ..req
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn ready_excludes_blocked_and_closed() {
    let tracker = FakeTracker::new();
    let blocker = tracker.create(CreateRequest::new("blocker")).await.unwrap();
    let blocked = tracker.create(CreateRequest::new("blocked")).await.unwrap();
    let free = tracker.create(CreateRequest::new("free")).await.unwrap();
    tracker.dep_add(&blocked, &blocker, None).await.unwrap();

    let ready: Vec<String> = tracker
        .ready()
        .await
        .unwrap()
        .iter()
        .map(|i| i.id.to_string())
        .collect();
    assert!(ready.contains(&blocker.to_string()));
    assert!(ready.contains(&free.to_string()));
    assert!(!ready.contains(&blocked.to_string()));

    // Closing the blocker unblocks the dependent
    tracker.close(&blocker, None).await.unwrap();
    let ready: Vec<String> = tracker
        .ready()
        .await
        .unwrap()
        .iter()
        .map(|i| i.id.to_string())
        .collect();
    assert!(ready.contains(&blocked.to_string()));
    assert!(!ready.contains(&blocker.to_string()));
}

#[tokio::test]
async fn dep_list_up_filters_by_type() {
    let tracker = FakeTracker::new();
    let issue = tracker.create(CreateRequest::new("issue")).await.unwrap();
    let convoy = tracker
        .create(CreateRequest {
            title: "convoy".into(),
            issue_type: Some(IssueType::Convoy),
            ..Default::default()
        })
        .await
        .unwrap();
    let task = tracker.create(CreateRequest::new("task")).await.unwrap();
    tracker
        .dep_add(&convoy, &issue, Some("tracks"))
        .await
        .unwrap();
    tracker.dep_add(&task, &issue, None).await.unwrap();

    let trackers = tracker
        .dep_list(&issue, DepDirection::Up, Some("tracks"))
        .await
        .unwrap();
    assert_eq!(trackers.len(), 1);
    assert_eq!(trackers[0].id, convoy);
}

#[tokio::test]
async fn not_found_predicate_matches_cli_stderr() {
    let tracker = FakeTracker::new();
    let err = tracker.show(&BeadId::new("gt-nope")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn close_records_reason_and_is_terminal() {
    let tracker = FakeTracker::new();
    let id = tracker.create(CreateRequest::new("done soon")).await.unwrap();
    tracker
        .close(&id, Some("Merged in gt-mr-1"))
        .await
        .unwrap();
    let item = tracker.show(&id).await.unwrap();
    assert_eq!(item.status, IssueStatus::Closed);
    assert_eq!(item.field("Close-Reason"), Some("Merged in gt-mr-1"));
}

#[tokio::test]
async fn update_status_reopens() {
    let tracker = FakeTracker::new();
    let id = tracker.create(CreateRequest::new("mr")).await.unwrap();
    tracker.close(&id, None).await.unwrap();
    tracker
        .update(
            &id,
            UpdateRequest {
                status: Some(IssueStatus::Open),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(tracker.show(&id).await.unwrap().status, IssueStatus::Open);
}
