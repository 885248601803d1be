// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixture helpers shared by other crates' tests.

use crate::issue::{BeadId, IssueStatus, IssueType, Priority, WorkItem};
use crate::merge_request::MergeRequestFields;
use crate::message::Message;

/// A minimal open work item of the given type.
pub fn work_item(id: &str, issue_type: IssueType) -> WorkItem {
    WorkItem {
        id: BeadId::new(id),
        title: format!("{issue_type} {id}"),
        issue_type,
        status: IssueStatus::Open,
        priority: Priority::DEFAULT,
        assignee: None,
        labels: Default::default(),
        depends_on: Vec::new(),
        blocked_by: Vec::new(),
        description: String::new(),
        created_at: None,
    }
}

/// A merge-request item whose description carries the standard fields.
pub fn merge_request(id: &str, branch: &str, worker: &str, rig: &str, source: &str) -> WorkItem {
    let mut item = work_item(id, IssueType::MergeRequest);
    item.description = MergeRequestFields {
        branch: Some(branch.to_string()),
        target: Some("main".to_string()),
        source_issue: Some(BeadId::new(source)),
        worker: Some(worker.to_string()),
        rig: Some(rig.to_string()),
        agent_bead: Some(BeadId::new(format!("{rig}-agent-{worker}"))),
        retry_count: 0,
        ..Default::default()
    }
    .render("Merge request");
    item
}

/// A wisp-subject mail message with a fixed timestamp.
pub fn wisp(from: &str, to: &str, subject: &str, body: &str) -> Message {
    Message::new(from, to, subject, body, "2026-01-01T00:00:00+00:00")
}
