// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_adapters::FakeTracker;

fn msg(subject: &str, ts: &str) -> Message {
    Message::new("gt/toast", "gt/witness", subject, "body", ts)
}

async fn exercise_store(store: &dyn MailboxStore) {
    let mailbox = "gt/witness";
    let first = msg("first", "2026-01-01T00:00:01+00:00");
    let second = msg("second", "2026-01-01T00:00:02+00:00");
    let third = msg("third", "2026-01-01T00:00:03+00:00")
        .with_thread("th-1");
    let fourth = msg("fourth", "2026-01-01T00:00:04+00:00")
        .with_thread("th-1");

    for m in [&first, &second, &third, &fourth] {
        store.append(mailbox, m).await.unwrap();
    }

    // list is newest-first
    let subjects: Vec<String> = store
        .list(mailbox)
        .await
        .unwrap()
        .iter()
        .map(|m| m.subject.clone())
        .collect();
    assert_eq!(subjects, vec!["fourth", "third", "second", "first"]);

    // threads are oldest-first
    let thread: Vec<String> = store
        .list_thread(mailbox, "th-1")
        .await
        .unwrap()
        .iter()
        .map(|m| m.subject.clone())
        .collect();
    assert_eq!(thread, vec!["third", "fourth"]);

    // read flag persists
    store.mark_read(mailbox, &first.id).await.unwrap();
    assert!(store.get(mailbox, &first.id).await.unwrap().read);
    assert_eq!(store.count(mailbox).await.unwrap().unread, 3);

    // peek lowers the unread count without flipping the bit
    store.mark_read_only(mailbox, &second.id).await.unwrap();
    assert!(!store.get(mailbox, &second.id).await.unwrap().read);
    assert_eq!(store.count(mailbox).await.unwrap().unread, 2);
    assert!(store
        .list_unread(mailbox)
        .await
        .unwrap()
        .iter()
        .all(|m| m.id != second.id));

    // delete removes
    store.delete(mailbox, &third.id).await.unwrap();
    assert_eq!(store.count(mailbox).await.unwrap().total, 3);
    assert!(matches!(
        store.get(mailbox, &third.id).await,
        Err(MailError::NotFound(_))
    ));
}

#[tokio::test]
async fn jsonl_store_contract() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonlMailbox::new(tmp.path());
    exercise_store(&store).await;

    // Separate identities map to separate files
    store
        .append("gt/polecats/toast", &msg("hi", "2026-01-01T00:00:05+00:00"))
        .await
        .unwrap();
    assert!(tmp.path().join("gt/polecats/toast.jsonl").exists());
}

#[tokio::test]
async fn tracker_store_contract() {
    let tracker = Arc::new(FakeTracker::new());
    let store = TrackerMailbox::new(tracker.clone());
    exercise_store(&store).await;

    // Deleted mail closes the backing item rather than losing history
    let closed = tracker
        .all()
        .iter()
        .filter(|item| item.status.is_closed())
        .count();
    assert_eq!(closed, 1);
}

#[tokio::test]
async fn jsonl_empty_mailbox_reads_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonlMailbox::new(tmp.path());
    assert!(store.list("gt/refinery").await.unwrap().is_empty());
    assert_eq!(store.count("gt/refinery").await.unwrap(), MailCounts::default());
}

#[tokio::test]
async fn jsonl_mark_read_survives_reload() {
    let tmp = tempfile::tempdir().unwrap();
    let message = msg("persisted", "2026-01-01T00:00:01+00:00");
    {
        let store = JsonlMailbox::new(tmp.path());
        store.append("gt", &message).await.unwrap();
        store.mark_read("gt", &message.id).await.unwrap();
    }
    // Fresh store instance: peek overlay is gone, read bit remains
    let store = JsonlMailbox::new(tmp.path());
    assert!(store.get("gt", &message.id).await.unwrap().read);
    assert_eq!(store.count("gt").await.unwrap().unread, 0);
}
