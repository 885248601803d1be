// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The serial merge algorithm for one claimed merge request.
//!
//! Outcomes are a closed set: merged (with commit), conflict (with the
//! unmerged files), or a non-conflict failure classified as tests or
//! build. Conflicts are detected twice: a merge-base-aware probe before
//! touching the working copy, and porcelain `diff --diff-filter=U` after
//! a failed merge. Any in-progress merge is aborted before returning.

use gt_adapters::git::{GitAdapter, GitError};
use gt_core::protocol::FailureType;
use std::path::Path;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of one merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Squash-merged and pushed; carries the merge commit sha.
    Merged { commit: String },
    /// The merge conflicts; carries the unmerged files (possibly empty
    /// when the pre-merge probe fired).
    Conflict { files: Vec<String> },
    /// Tests or build failed, or the branch is unusable.
    Failed { failure: FailureType, error: String },
    /// Cancelled mid-flight; nothing should be reported.
    Cancelled,
}

/// How a test run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestsOutcome {
    Passed,
    Failed { output: String },
    Cancelled,
}

/// Run the configured test command with up to `attempts` tries.
/// Cancellation aborts immediately and abandons the attempt without
/// reporting a failure.
pub async fn run_tests(
    repo: &Path,
    command: &str,
    attempts: u32,
    cancel: &CancellationToken,
) -> TestsOutcome {
    let attempts = attempts.max(1);
    let mut last_output = String::new();
    for attempt in 1..=attempts {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]).current_dir(repo).kill_on_drop(true);

        let run = async {
            match cmd.output().await {
                Ok(output) => {
                    if output.status.success() {
                        None
                    } else {
                        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                        text.push_str(&String::from_utf8_lossy(&output.stderr));
                        Some(text)
                    }
                }
                Err(err) => Some(format!("failed to run tests: {err}")),
            }
        };

        tokio::select! {
            () = cancel.cancelled() => return TestsOutcome::Cancelled,
            failure = run => match failure {
                None => return TestsOutcome::Passed,
                Some(output) => {
                    warn!(attempt, attempts, "test run failed");
                    last_output = output;
                }
            },
        }
    }
    TestsOutcome::Failed {
        output: last_output,
    }
}

/// Parameters for [`merge_one`].
pub struct MergeJob<'a> {
    pub repo: &'a Path,
    pub branch: &'a str,
    pub target: &'a str,
    pub test_command: Option<&'a str>,
    pub test_attempts: u32,
}

/// Execute the merge algorithm for one request against `git`.
pub async fn merge_one(
    git: &dyn GitAdapter,
    job: MergeJob<'_>,
    cancel: &CancellationToken,
) -> Result<MergeOutcome, GitError> {
    // 1. The branch must exist locally: workers and refinery share the
    //    object store, so a missing branch means the worker never
    //    pushed its work into the shared repo.
    let branches = git.branch_list(job.repo).await?;
    if !branches.iter().any(|b| b == job.branch) {
        return Ok(MergeOutcome::Failed {
            failure: FailureType::Build,
            error: format!("branch {} not found locally", job.branch),
        });
    }

    // 2. Check out the target and freshen it. Pull failures are
    //    warnings, not fatal: the working copy may be the source of
    //    truth.
    git.checkout(job.repo, job.target).await?;
    if let Err(err) = git.pull(job.repo, "origin", job.target).await {
        warn!(target = job.target, error = %err, "pull before merge failed; continuing");
    }

    // 3. Probe for conflicts without touching the working copy.
    if git
        .merge_would_conflict(job.repo, job.branch, job.target)
        .await?
    {
        return Ok(MergeOutcome::Conflict { files: Vec::new() });
    }

    // 4. Tests, if configured.
    if let Some(command) = job.test_command {
        match run_tests(job.repo, command, job.test_attempts, cancel).await {
            TestsOutcome::Passed => {}
            TestsOutcome::Cancelled => return Ok(MergeOutcome::Cancelled),
            TestsOutcome::Failed { output } => {
                return Ok(MergeOutcome::Failed {
                    failure: FailureType::Tests,
                    error: output,
                });
            }
        }
    }

    if cancel.is_cancelled() {
        return Ok(MergeOutcome::Cancelled);
    }

    // 5. Squash-merge, preserving the source branch's original commit
    //    message (and with it any conventional-commit prefix).
    let message = git.commit_message(job.repo, job.branch).await?;
    if let Err(err) = git.squash_merge(job.repo, job.branch, &message).await {
        let files = git.conflict_files(job.repo).await.unwrap_or_default();
        git.merge_abort(job.repo).await?;
        if files.is_empty() {
            return Ok(MergeOutcome::Failed {
                failure: FailureType::Build,
                error: err
                    .stderr()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string()),
            });
        }
        return Ok(MergeOutcome::Conflict { files });
    }

    // 6. Push and capture the merge commit.
    git.push(job.repo, "origin", job.target).await?;
    let commit = git.rev_parse(job.repo, "HEAD").await?;
    info!(branch = job.branch, target = job.target, commit = %commit, "merged");
    Ok(MergeOutcome::Merged { commit })
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
