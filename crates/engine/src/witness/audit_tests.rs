// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_adapters::FakeGit;

async fn head_sha(git: &FakeGit) -> String {
    git.rev_parse(Path::new("/w"), "HEAD").await.unwrap()
}

#[tokio::test]
async fn verified_when_head_on_remote_default() {
    let git = FakeGit::new();
    git.set_ancestor(&head_sha(&git).await, "origin/main");
    assert!(verify_commit_on_main(&git, Path::new("/w")).await);
}

#[tokio::test]
async fn verified_when_head_on_local_default_only() {
    let git = FakeGit::new();
    git.set_ancestor(&head_sha(&git).await, "main");
    assert!(verify_commit_on_main(&git, Path::new("/w")).await);
}

#[tokio::test]
async fn unverified_when_head_nowhere() {
    let git = FakeGit::new();
    assert!(!verify_commit_on_main(&git, Path::new("/w")).await);
}

#[tokio::test]
async fn decision_tree() {
    let git = FakeGit::new();

    // clean → nuke regardless of git state
    assert_eq!(
        auto_nuke_decision(CleanupStatus::Clean, &git, Path::new("/w")).await,
        NukeDecision::Nuke
    );

    // has_* → skip with the reason
    for status in [
        CleanupStatus::HasUncommitted,
        CleanupStatus::HasStash,
        CleanupStatus::HasUnpushed,
    ] {
        assert_eq!(
            auto_nuke_decision(status, &git, Path::new("/w")).await,
            NukeDecision::SkipDirty(status)
        );
    }

    // unknown + not on main → skip
    assert_eq!(
        auto_nuke_decision(CleanupStatus::Unknown, &git, Path::new("/w")).await,
        NukeDecision::SkipUnverified
    );

    // unknown + on main → nuke
    git.set_ancestor(&head_sha(&git).await, "origin/main");
    assert_eq!(
        auto_nuke_decision(CleanupStatus::Unknown, &git, Path::new("/w")).await,
        NukeDecision::Nuke
    );
}
