// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_adapters::FakeGit;

fn job<'a>(branch: &'a str, target: &'a str) -> MergeJob<'a> {
    MergeJob {
        repo: Path::new("/repo"),
        branch,
        target,
        test_command: None,
        test_attempts: 1,
    }
}

#[tokio::test]
async fn clean_merge_pushes_and_reports_commit() {
    let git = FakeGit::new();
    git.add_branch("polecat/toast/abc@1");
    git.set_commit_message("polecat/toast/abc@1", "feat: auth fix");
    let cancel = CancellationToken::new();

    let outcome = merge_one(&git, job("polecat/toast/abc@1", "main"), &cancel)
        .await
        .unwrap();
    let MergeOutcome::Merged { commit } = outcome else {
        panic!("expected merge, got {outcome:?}");
    };
    assert_eq!(commit.len(), 40);

    // Squash commit reused the source branch's message
    assert_eq!(
        git.merges(),
        vec![(
            "polecat/toast/abc@1".to_string(),
            "main".to_string(),
            "feat: auth fix".to_string()
        )]
    );
    assert_eq!(git.pushes(), vec![("origin".to_string(), "main".to_string())]);
}

#[tokio::test]
async fn missing_branch_is_a_build_failure() {
    let git = FakeGit::new();
    let cancel = CancellationToken::new();
    let outcome = merge_one(&git, job("nope", "main"), &cancel).await.unwrap();
    assert!(matches!(
        outcome,
        MergeOutcome::Failed {
            failure: FailureType::Build,
            ..
        }
    ));
}

#[tokio::test]
async fn probe_detects_conflict_before_merging() {
    let git = FakeGit::new();
    git.add_branch("polecat/nux-1");
    git.set_conflict("polecat/nux-1", "main", &["a.go", "b.go"]);
    let cancel = CancellationToken::new();

    let outcome = merge_one(&git, job("polecat/nux-1", "main"), &cancel)
        .await
        .unwrap();
    assert!(matches!(outcome, MergeOutcome::Conflict { .. }));
    // Nothing was merged or pushed
    assert!(git.merges().is_empty());
    assert!(git.pushes().is_empty());
}

#[tokio::test]
async fn pull_failure_is_nonfatal() {
    let git = FakeGit::new();
    git.add_branch("b");
    git.set_fail_pull(true);
    let cancel = CancellationToken::new();
    let outcome = merge_one(&git, job("b", "main"), &cancel).await.unwrap();
    assert!(matches!(outcome, MergeOutcome::Merged { .. }));
}

#[tokio::test]
async fn failing_tests_fail_the_merge() {
    let git = FakeGit::new();
    git.add_branch("b");
    let cancel = CancellationToken::new();
    let mut j = job("b", "main");
    j.test_command = Some("exit 1");
    let outcome = merge_one(&git, j, &cancel).await.unwrap();
    assert!(matches!(
        outcome,
        MergeOutcome::Failed {
            failure: FailureType::Tests,
            ..
        }
    ));
    assert!(git.merges().is_empty());
}

#[tokio::test]
async fn flaky_test_retries_up_to_attempts() {
    let tmp = tempfile::tempdir().unwrap();
    // Fails on the first run, passes once the marker exists
    let marker = tmp.path().join("ran-once");
    let command = format!(
        "test -f {marker} || {{ touch {marker}; exit 1; }}",
        marker = marker.display()
    );
    let cancel = CancellationToken::new();

    let outcome = run_tests(tmp.path(), &command, 2, &cancel).await;
    assert_eq!(outcome, TestsOutcome::Passed);
}

#[tokio::test]
async fn cancellation_aborts_test_run_immediately() {
    let tmp = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let start = std::time::Instant::now();
    let outcome = run_tests(tmp.path(), "sleep 30", 3, &cancel).await;
    assert_eq!(outcome, TestsOutcome::Cancelled);
    assert!(start.elapsed() < std::time::Duration::from_secs(5));
}
