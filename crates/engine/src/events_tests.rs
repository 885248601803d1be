// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn ts(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).single().unwrap()
}

fn record(seconds: i64, event_type: &str, actor: &str, visibility: Visibility) -> EventRecord {
    EventRecord::new(
        ts(seconds).to_rfc3339(),
        event_type,
        actor,
        serde_json::Value::Null,
        visibility,
    )
}

struct Fixture {
    raw: EventLog,
    feed: EventLog,
    curator: Curator,
    _tmp: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let raw_path = tmp.path().join(".events.jsonl");
    let feed_path = tmp.path().join(".feed.jsonl");
    Fixture {
        raw: EventLog::new(&raw_path),
        feed: EventLog::new(&feed_path),
        curator: Curator::new(&raw_path, &feed_path, CuratorConfig::default()),
        _tmp: tmp,
    }
}

#[test]
fn audit_only_records_are_dropped() {
    let f = fixture();
    f.raw.append(&record(0, "lock.reclaimed", "gt/toast", Visibility::Audit)).unwrap();
    f.raw.append(&record(1, "polecat.spawned", "gt/toast", Visibility::Both)).unwrap();

    f.curator.process_available(ts(2)).unwrap();
    let feed = f.feed.read_all().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].event_type, "polecat.spawned");
}

#[test]
fn completions_dedup_within_window() {
    let f = fixture();
    f.raw.append(&record(0, "merge.completed", "gt/refinery", Visibility::Feed)).unwrap();
    f.raw.append(&record(5, "merge.completed", "gt/refinery", Visibility::Feed)).unwrap();
    // Outside the 10s window: kept
    f.raw.append(&record(15, "merge.completed", "gt/refinery", Visibility::Feed)).unwrap();
    // Different actor: kept even inside the window
    f.raw.append(&record(5, "merge.completed", "gt2/refinery", Visibility::Feed)).unwrap();

    f.curator.process_available(ts(60)).unwrap();
    let feed = f.feed.read_all().unwrap();
    assert_eq!(feed.len(), 3);
}

#[test]
fn dispatch_burst_aggregates_at_threshold() {
    let f = fixture();
    for i in 0..4 {
        f.raw.append(&record(i, "dispatch", &format!("gt/p{i}"), Visibility::Feed)).unwrap();
    }

    // Within the window nothing is emitted yet
    f.curator.process_available(ts(10)).unwrap();
    assert!(f.feed.read_all().unwrap().is_empty());

    // After 30s the burst folds into one aggregate record
    f.curator.process_available(ts(31)).unwrap();
    let feed = f.feed.read_all().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].event_type, "dispatch.aggregate");
    assert_eq!(feed[0].payload["count"], 4);
    assert_eq!(feed[0].payload["summary"], "dispatching to 4");
}

#[test]
fn small_dispatch_batches_pass_through_individually() {
    let f = fixture();
    f.raw.append(&record(0, "dispatch", "gt/toast", Visibility::Feed)).unwrap();
    f.raw.append(&record(1, "dispatch", "gt/nux", Visibility::Feed)).unwrap();

    f.curator.process_available(ts(31)).unwrap();
    let feed = f.feed.read_all().unwrap();
    assert_eq!(feed.len(), 2);
    assert!(feed.iter().all(|r| r.event_type == "dispatch"));
}

#[test]
fn aggregation_threshold_is_configurable() {
    let tmp = tempfile::tempdir().unwrap();
    let raw_path = tmp.path().join(".events.jsonl");
    let feed_path = tmp.path().join(".feed.jsonl");
    let raw = EventLog::new(&raw_path);
    let curator = Curator::new(
        &raw_path,
        &feed_path,
        CuratorConfig {
            dispatch_aggregate_threshold: 2,
            ..Default::default()
        },
    );
    raw.append(&record(0, "dispatch", "a", Visibility::Feed)).unwrap();
    raw.append(&record(1, "dispatch", "b", Visibility::Feed)).unwrap();

    curator.process_available(ts(31)).unwrap();
    let feed = EventLog::new(&feed_path).read_all().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].event_type, "dispatch.aggregate");
}

#[test]
fn incremental_reads_resume_from_offset() {
    let f = fixture();
    f.raw.append(&record(0, "polecat.spawned", "gt/toast", Visibility::Feed)).unwrap();
    assert_eq!(f.curator.process_available(ts(1)).unwrap(), 1);

    f.raw.append(&record(2, "polecat.spawned", "gt/nux", Visibility::Feed)).unwrap();
    // Only the new record is consumed on the second pass
    assert_eq!(f.curator.process_available(ts(3)).unwrap(), 1);
    assert_eq!(f.feed.read_all().unwrap().len(), 2);
}

#[test]
fn corrupt_lines_are_skipped() {
    let f = fixture();
    f.raw.append(&record(0, "polecat.spawned", "gt/toast", Visibility::Feed)).unwrap();
    std::fs::OpenOptions::new()
        .append(true)
        .open(f.raw.path())
        .unwrap()
        .write_all(b"{corrupt\n")
        .unwrap();
    f.raw.append(&record(1, "polecat.spawned", "gt/nux", Visibility::Feed)).unwrap();

    f.curator.process_available(ts(2)).unwrap();
    assert_eq!(f.feed.read_all().unwrap().len(), 2);
}
