// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario: molecule instantiation.
//!
//! design → implement → test → submit, with the submit step needing
//! both implement and test. A reference to a missing step aborts and
//! compensates by closing whatever was created.

use crate::prelude::*;
use gt_engine::molecule::{instantiate_markdown, parse_markdown, InstantiateError};
use std::collections::HashMap;

const DOC: &str = "\
## Step: design
## Step: implement
Needs: design
## Step: test
Needs: implement
## Step: submit
Needs: implement, test
";

#[tokio::test]
async fn four_steps_with_wired_dependencies() {
    let t = Town::new().await;
    let parent = t
        .tracker
        .create(CreateRequest::new("swarm"))
        .await
        .unwrap();

    let created = instantiate_markdown(
        Arc::new(t.tracker.clone()),
        &parse_markdown(DOC),
        &parent,
        &HashMap::new(),
    )
    .await
    .unwrap();
    assert_eq!(created.len(), 4);

    // Only design is ready; submit waits on implement and test
    let ready: Vec<String> = t
        .tracker
        .ready()
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.title)
        .collect();
    assert!(ready.contains(&"design".to_string()));
    assert!(!ready.contains(&"submit".to_string()));

    // Closing down the chain unblocks each successor
    for step in ["design", "implement", "test"] {
        let item = t
            .tracker
            .all()
            .into_iter()
            .find(|i| i.title == step)
            .unwrap();
        t.tracker.close(&item.id, None).await.unwrap();
    }
    let ready: Vec<String> = t
        .tracker
        .ready()
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.title)
        .collect();
    assert!(ready.contains(&"submit".to_string()));
}

#[tokio::test]
async fn missing_step_reference_aborts_with_compensation() {
    let t = Town::new().await;
    let parent = t
        .tracker
        .create(CreateRequest::new("swarm"))
        .await
        .unwrap();
    let before = t.tracker.all().len();

    let err = instantiate_markdown(
        Arc::new(t.tracker.clone()),
        &parse_markdown("## Step: submit\nNeeds: implement, test\n"),
        &parent,
        &HashMap::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, InstantiateError::Invalid(_)));

    // Validation failed up front: nothing was created at all
    assert_eq!(t.tracker.all().len(), before);
}
