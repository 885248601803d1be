// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::channels::{AnnounceChannel, ListChannel, QueueChannel};
use crate::store::JsonlMailbox;
use gt_adapters::tracker::CreateRequest;
use gt_adapters::FakeTracker;

struct Fixture {
    router: Router,
    store: Arc<JsonlMailbox>,
    _tmp: tempfile::TempDir,
}

async fn fixture(config: MessagingConfig) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonlMailbox::new(tmp.path()));
    let tracker = Arc::new(FakeTracker::new());

    // Register the usual cast of agent identities
    for address in [
        "gt/witness",
        "gt/refinery",
        "gt/polecats/toast",
        "gt/polecats/nux",
        "gt/crew/ace",
        "mayor",
    ] {
        tracker
            .create(CreateRequest {
                title: format!("agent {address}"),
                issue_type: Some(gt_core::issue::IssueType::AgentIdentity),
                description: Some(format!("address: {address}")),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    Fixture {
        router: Router::new(store.clone(), tracker, config),
        store,
        _tmp: tmp,
    }
}

fn opts() -> SendOptions {
    SendOptions::at("2026-01-01T00:00:00+00:00")
}

#[tokio::test]
async fn direct_send_to_registered_worker() {
    let f = fixture(MessagingConfig::default()).await;
    let outcome = f
        .router
        .send("gt/witness", "gt/polecats/toast", "NUDGE", "", opts())
        .await
        .unwrap();
    assert_eq!(outcome.delivered, vec!["gt/polecats/toast"]);

    let inbox = f.store.list("gt/polecats/toast").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert!(inbox[0].wisp, "NUDGE is a wisp subject");
}

#[tokio::test]
async fn unqualified_worker_tries_crew_then_polecats() {
    let f = fixture(MessagingConfig::default()).await;
    // ace is crew; toast is a polecat
    let crew = f
        .router
        .resolve(&Recipient::parse("gt/ace").unwrap())
        .await
        .unwrap();
    assert_eq!(crew, vec!["gt/crew/ace"]);

    let polecat = f
        .router
        .resolve(&Recipient::parse("gt/toast").unwrap())
        .await
        .unwrap();
    assert_eq!(polecat, vec!["gt/polecats/toast"]);
}

#[tokio::test]
async fn unregistered_recipient_is_rejected() {
    let f = fixture(MessagingConfig::default()).await;
    let err = f
        .router
        .send("gt/witness", "gt/polecats/ghost", "hi", "", opts())
        .await
        .unwrap_err();
    assert!(matches!(err, MailError::UnknownRecipient(_)));
}

#[tokio::test]
async fn overseer_is_always_valid() {
    let f = fixture(MessagingConfig::default()).await;
    let outcome = f
        .router
        .send("gt/witness", "overseer", "RECOVERY_NEEDED gt/toast", "", opts())
        .await
        .unwrap();
    assert_eq!(outcome.delivered, vec!["overseer"]);
}

#[tokio::test]
async fn self_mail_is_dropped_silently() {
    let f = fixture(MessagingConfig::default()).await;
    let outcome = f
        .router
        .send("gt/polecats/toast", "gt/toast", "note to self", "", opts())
        .await
        .unwrap();
    assert!(outcome.delivered.is_empty());
    assert_eq!(outcome.dropped_self, 1);
    assert!(f.store.list("gt/polecats/toast").await.unwrap().is_empty());
}

#[tokio::test]
async fn rig_broadcast_reaches_all_rig_agents() {
    let f = fixture(MessagingConfig::default()).await;
    let outcome = f
        .router
        .send("mayor", "gt", "START_WORK", "", opts())
        .await
        .unwrap();
    let mut delivered = outcome.delivered.clone();
    delivered.sort();
    assert_eq!(
        delivered,
        vec![
            "gt/crew/ace",
            "gt/polecats/nux",
            "gt/polecats/toast",
            "gt/refinery",
            "gt/witness",
        ]
    );
}

#[tokio::test]
async fn group_expansion() {
    let f = fixture(MessagingConfig::default()).await;

    let witnesses = f
        .router
        .resolve(&Recipient::parse("@witnesses").unwrap())
        .await
        .unwrap();
    assert_eq!(witnesses, vec!["gt/witness"]);

    let polecats = f
        .router
        .resolve(&Recipient::parse("@polecats/gt").unwrap())
        .await
        .unwrap();
    assert_eq!(polecats.len(), 2);

    let town = f
        .router
        .resolve(&Recipient::parse("@town").unwrap())
        .await
        .unwrap();
    assert_eq!(town.len(), 6);

    let overseer = f
        .router
        .resolve(&Recipient::parse("@overseer").unwrap())
        .await
        .unwrap();
    assert_eq!(overseer, vec!["overseer"]);
}

#[tokio::test]
async fn list_channel_fans_out() {
    let mut config = MessagingConfig::default();
    config.lists.insert(
        "leads".into(),
        ListChannel {
            recipients: vec!["gt/witness".into(), "mayor".into()],
        },
    );
    let f = fixture(config).await;
    let outcome = f
        .router
        .send("gt/refinery", "list:leads", "update", "", opts())
        .await
        .unwrap();
    assert_eq!(outcome.delivered, vec!["gt/witness", "mayor"]);
}

#[tokio::test]
async fn queue_prefers_earlier_recipient_under_claim_bound() {
    let mut config = MessagingConfig::default();
    config.queues.insert(
        "chores".into(),
        QueueChannel {
            recipients: vec!["gt/toast".into(), "gt/nux".into()],
            max_claims: 1,
        },
    );
    let f = fixture(config).await;

    // First send goes to toast
    let first = f
        .router
        .send("mayor", "queue:chores", "chore 1", "", opts())
        .await
        .unwrap();
    assert_eq!(first.delivered, vec!["gt/polecats/toast"]);

    // toast is now at its claim bound; nux wins
    let second = f
        .router
        .send("mayor", "queue:chores", "chore 2", "", opts())
        .await
        .unwrap();
    assert_eq!(second.delivered, vec!["gt/polecats/nux"]);

    // Both saturated
    let err = f
        .router
        .send("mayor", "queue:chores", "chore 3", "", opts())
        .await
        .unwrap_err();
    assert!(matches!(err, MailError::QueueSaturated(_)));
}

#[tokio::test]
async fn announce_delivers_and_retains() {
    let mut config = MessagingConfig::default();
    config.announces.insert(
        "status".into(),
        AnnounceChannel {
            subscribers: vec!["mayor".into()],
            retain: 2,
        },
    );
    let f = fixture(config).await;

    for i in 0..4 {
        f.router
            .send(
                "gt/refinery",
                "announce:status",
                &format!("status {i}"),
                "",
                SendOptions::at(format!("2026-01-01T00:00:0{i}+00:00")),
            )
            .await
            .unwrap();
    }

    // Subscribers got every announcement
    assert_eq!(f.store.list("mayor").await.unwrap().len(), 4);
    // The channel mailbox retains only the newest two
    let retained = f.store.list("announce/status").await.unwrap();
    assert_eq!(retained.len(), 2);
    assert_eq!(retained[0].subject, "status 3");
}

#[tokio::test]
async fn unknown_channel_is_an_error() {
    let f = fixture(MessagingConfig::default()).await;
    let err = f
        .router
        .send("mayor", "list:nope", "x", "", opts())
        .await
        .unwrap_err();
    assert!(matches!(err, MailError::UnknownChannel(_)));
}
