// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample() -> MergeRequestFields {
    MergeRequestFields {
        branch: Some("polecat/toast/gt-abc@1700".into()),
        target: Some("main".into()),
        source_issue: Some(BeadId::new("gt-abc")),
        worker: Some("toast".into()),
        rig: Some("gt".into()),
        agent_bead: Some(BeadId::new("gt-agent-toast")),
        retry_count: 1,
        convoy_id: None,
        convoy_created_at: None,
        merge_commit: None,
        close_reason: None,
    }
}

#[test]
fn render_then_parse_roundtrips() {
    let rendered = sample().render("Merge toast's auth fix.");
    let parsed = MergeRequestFields::from_description(&rendered);
    assert_eq!(parsed, sample());
    assert!(rendered.starts_with("Merge toast's auth fix."));
}

#[test]
fn apply_preserves_prose_and_unknown_fields() {
    let desc = "Some context prose.\nCustom-Field: keep me\nRetry-Count: 0";
    let mut fields = MergeRequestFields::from_description(desc);
    fields.retry_count = 2;
    fields.merge_commit = Some("deadbeef".into());

    let updated = fields.apply_to(desc);
    assert!(updated.contains("Some context prose."));
    assert!(updated.contains("Custom-Field: keep me"));
    assert_eq!(crate::fields::get_field(&updated, "Retry-Count"), Some("2"));
    assert_eq!(
        crate::fields::get_field(&updated, "Merge-Commit"),
        Some("deadbeef")
    );
}

#[test]
fn malformed_retry_count_reads_zero() {
    let parsed = MergeRequestFields::from_description("Retry-Count: not-a-number");
    assert_eq!(parsed.retry_count, 0);
}

#[test]
fn none_fields_never_delete_existing_lines() {
    let desc = "Merge-Commit: abc123\nRetry-Count: 1";
    let updated = MergeRequestFields {
        retry_count: 1,
        ..Default::default()
    }
    .apply_to(desc);
    assert_eq!(
        crate::fields::get_field(&updated, "Merge-Commit"),
        Some("abc123")
    );
}
