// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git porcelain adapter.
//!
//! Thin, explicit wrappers over the `git` binary. Worktrees of one rig
//! share a single object store via alternates, and only one fetch/pull
//! is safe per repository at a time, so remote operations are serialized
//! per repo path.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::subprocess::{
    run_with_timeout, stderr_trimmed, stdout_trimmed, GIT_REMOTE_TIMEOUT, GIT_TIMEOUT,
};

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git: {0}")]
    Subprocess(#[from] crate::subprocess::SubprocessError),
    #[error("git {op} failed: {stderr}")]
    Command { op: &'static str, stderr: String },
}

impl GitError {
    pub fn stderr(&self) -> Option<&str> {
        match self {
            GitError::Command { stderr, .. } => Some(stderr),
            GitError::Subprocess(_) => None,
        }
    }
}

#[async_trait]
pub trait GitAdapter: Send + Sync {
    async fn init(&self, repo: &Path) -> Result<(), GitError>;
    /// Clone sharing the source's object store (alternates, no
    /// redownload).
    async fn clone_shared(&self, source: &Path, dest: &Path) -> Result<(), GitError>;
    async fn worktree_add(
        &self,
        repo: &Path,
        path: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), GitError>;
    async fn worktree_remove(&self, repo: &Path, path: &Path, force: bool) -> Result<(), GitError>;
    async fn checkout(&self, repo: &Path, branch: &str) -> Result<(), GitError>;
    async fn pull(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError>;
    async fn fetch(&self, repo: &Path, remote: &str) -> Result<(), GitError>;
    async fn rev_parse(&self, repo: &Path, rev: &str) -> Result<String, GitError>;
    async fn branch_list(&self, repo: &Path) -> Result<Vec<String>, GitError>;
    async fn remotes(&self, repo: &Path) -> Result<Vec<String>, GitError>;
    /// Squash-merge `branch` into the current branch and commit with
    /// `message`.
    async fn squash_merge(&self, repo: &Path, branch: &str, message: &str) -> Result<(), GitError>;
    async fn merge_abort(&self, repo: &Path) -> Result<(), GitError>;
    /// Unmerged paths (porcelain `diff --name-only --diff-filter=U`).
    async fn conflict_files(&self, repo: &Path) -> Result<Vec<String>, GitError>;
    /// Merge-base-aware probe: would merging `branch` into `target`
    /// conflict?
    async fn merge_would_conflict(
        &self,
        repo: &Path,
        branch: &str,
        target: &str,
    ) -> Result<bool, GitError>;
    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError>;
    async fn delete_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError>;
    async fn delete_remote_branch(
        &self,
        repo: &Path,
        remote: &str,
        branch: &str,
    ) -> Result<(), GitError>;
    async fn is_ancestor(
        &self,
        repo: &Path,
        ancestor: &str,
        descendant: &str,
    ) -> Result<bool, GitError>;
    /// Full commit message of a rev (used to carry the source branch's
    /// message through a squash merge).
    async fn commit_message(&self, repo: &Path, rev: &str) -> Result<String, GitError>;
    /// The repository's default branch (origin/HEAD, falling back to
    /// `main`).
    async fn default_branch(&self, repo: &Path) -> Result<String, GitError>;
}

/// The real adapter.
#[derive(Default)]
pub struct GitCli {
    /// Per-repo guard: alternates-backed repos tolerate only one
    /// fetch/pull at a time.
    remote_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    fn remote_lock(&self, repo: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.remote_locks
            .lock()
            .entry(repo.to_path_buf())
            .or_default()
            .clone()
    }

    async fn git(
        &self,
        repo: Option<&Path>,
        op: &'static str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<std::process::Output, GitError> {
        debug!(op, ?args, "git call");
        let mut cmd = Command::new("git");
        if let Some(repo) = repo {
            cmd.arg("-C").arg(repo);
        }
        cmd.args(args)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE");
        Ok(run_with_timeout(cmd, timeout, "git").await?)
    }

    async fn git_ok(
        &self,
        repo: Option<&Path>,
        op: &'static str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<std::process::Output, GitError> {
        let output = self.git(repo, op, args, timeout).await?;
        if !output.status.success() {
            return Err(GitError::Command {
                op,
                stderr: stderr_trimmed(&output),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl GitAdapter for GitCli {
    async fn init(&self, repo: &Path) -> Result<(), GitError> {
        self.git_ok(Some(repo), "init", &["init"], GIT_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn clone_shared(&self, source: &Path, dest: &Path) -> Result<(), GitError> {
        let _guard = self.remote_lock(source);
        let _held = _guard.lock().await;
        let source = source.display().to_string();
        let dest = dest.display().to_string();
        self.git_ok(
            None,
            "clone",
            &["clone", "--shared", &source, &dest],
            GIT_REMOTE_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn worktree_add(
        &self,
        repo: &Path,
        path: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), GitError> {
        let path = path.display().to_string();
        self.git_ok(
            Some(repo),
            "worktree add",
            &["worktree", "add", "-b", branch, &path, start_point],
            GIT_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn worktree_remove(&self, repo: &Path, path: &Path, force: bool) -> Result<(), GitError> {
        let path = path.display().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path);
        self.git_ok(Some(repo), "worktree remove", &args, GIT_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn checkout(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        self.git_ok(Some(repo), "checkout", &["checkout", branch], GIT_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn pull(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        let lock = self.remote_lock(repo);
        let _held = lock.lock().await;
        self.git_ok(
            Some(repo),
            "pull",
            &["pull", remote, branch],
            GIT_REMOTE_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn fetch(&self, repo: &Path, remote: &str) -> Result<(), GitError> {
        let lock = self.remote_lock(repo);
        let _held = lock.lock().await;
        self.git_ok(Some(repo), "fetch", &["fetch", remote], GIT_REMOTE_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn rev_parse(&self, repo: &Path, rev: &str) -> Result<String, GitError> {
        let output = self
            .git_ok(Some(repo), "rev-parse", &["rev-parse", rev], GIT_TIMEOUT)
            .await?;
        Ok(stdout_trimmed(&output))
    }

    async fn branch_list(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        let output = self
            .git_ok(
                Some(repo),
                "branch",
                &["branch", "--list", "--format=%(refname:short)"],
                GIT_TIMEOUT,
            )
            .await?;
        Ok(stdout_trimmed(&output)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn remotes(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        let output = self
            .git_ok(Some(repo), "remote", &["remote"], GIT_TIMEOUT)
            .await?;
        Ok(stdout_trimmed(&output)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn squash_merge(&self, repo: &Path, branch: &str, message: &str) -> Result<(), GitError> {
        self.git_ok(
            Some(repo),
            "merge",
            &["merge", "--squash", branch],
            GIT_TIMEOUT,
        )
        .await?;
        self.git_ok(
            Some(repo),
            "commit",
            &["commit", "-m", message],
            GIT_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn merge_abort(&self, repo: &Path) -> Result<(), GitError> {
        // Squash merges leave staged state rather than MERGE_HEAD, so
        // fall back to a reset when there is no merge to abort.
        let output = self
            .git(Some(repo), "merge abort", &["merge", "--abort"], GIT_TIMEOUT)
            .await?;
        if !output.status.success() {
            self.git_ok(
                Some(repo),
                "reset",
                &["reset", "--hard", "HEAD"],
                GIT_TIMEOUT,
            )
            .await?;
        }
        Ok(())
    }

    async fn conflict_files(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        let output = self
            .git_ok(
                Some(repo),
                "diff",
                &["diff", "--name-only", "--diff-filter=U"],
                GIT_TIMEOUT,
            )
            .await?;
        Ok(stdout_trimmed(&output)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn merge_would_conflict(
        &self,
        repo: &Path,
        branch: &str,
        target: &str,
    ) -> Result<bool, GitError> {
        // merge-tree performs a real three-way merge in memory: exit 0
        // means clean, 1 means conflicts, anything else is an error.
        let output = self
            .git(
                Some(repo),
                "merge-tree",
                &["merge-tree", "--write-tree", target, branch],
                GIT_TIMEOUT,
            )
            .await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(GitError::Command {
                op: "merge-tree",
                stderr: stderr_trimmed(&output),
            }),
        }
    }

    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        let lock = self.remote_lock(repo);
        let _held = lock.lock().await;
        self.git_ok(
            Some(repo),
            "push",
            &["push", remote, branch],
            GIT_REMOTE_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn delete_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError> {
        self.git_ok(
            Some(repo),
            "branch -D",
            &["branch", "-D", branch],
            GIT_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn delete_remote_branch(
        &self,
        repo: &Path,
        remote: &str,
        branch: &str,
    ) -> Result<(), GitError> {
        let lock = self.remote_lock(repo);
        let _held = lock.lock().await;
        self.git_ok(
            Some(repo),
            "push --delete",
            &["push", remote, "--delete", branch],
            GIT_REMOTE_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn is_ancestor(
        &self,
        repo: &Path,
        ancestor: &str,
        descendant: &str,
    ) -> Result<bool, GitError> {
        let output = self
            .git(
                Some(repo),
                "merge-base",
                &["merge-base", "--is-ancestor", ancestor, descendant],
                GIT_TIMEOUT,
            )
            .await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(GitError::Command {
                op: "merge-base",
                stderr: stderr_trimmed(&output),
            }),
        }
    }

    async fn commit_message(&self, repo: &Path, rev: &str) -> Result<String, GitError> {
        let output = self
            .git_ok(
                Some(repo),
                "log",
                &["log", "-1", "--format=%B", rev],
                GIT_TIMEOUT,
            )
            .await?;
        Ok(stdout_trimmed(&output))
    }

    async fn default_branch(&self, repo: &Path) -> Result<String, GitError> {
        let output = self
            .git(
                Some(repo),
                "symbolic-ref",
                &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"],
                GIT_TIMEOUT,
            )
            .await?;
        if output.status.success() {
            let full = stdout_trimmed(&output);
            // "origin/main" -> "main"
            return Ok(full
                .split_once('/')
                .map(|(_, b)| b.to_string())
                .unwrap_or(full));
        }
        Ok("main".to_string())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeGit;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    #[derive(Default)]
    struct Inner {
        branches: BTreeSet<String>,
        /// (branch, target) pairs that conflict, with their unmerged
        /// files.
        conflicts: BTreeMap<(String, String), Vec<String>>,
        /// Unmerged files left behind by the last failed merge.
        current_conflict: Vec<String>,
        /// (rev, descendant-ref) pairs where rev is an ancestor.
        ancestors: BTreeSet<(String, String)>,
        remotes: Vec<String>,
        checked_out: String,
        merges: Vec<(String, String, String)>,
        pushes: Vec<(String, String)>,
        deleted_branches: Vec<String>,
        deleted_remote_branches: Vec<String>,
        messages: BTreeMap<String, String>,
        fail_pull: bool,
    }

    /// Scriptable in-memory git for engine tests.
    #[derive(Clone, Default)]
    pub struct FakeGit {
        inner: Arc<Mutex<Inner>>,
    }

    impl FakeGit {
        pub fn new() -> Self {
            let fake = Self::default();
            {
                let mut inner = fake.inner.lock();
                inner.remotes.push("origin".to_string());
                inner.checked_out = "main".to_string();
                inner.branches.insert("main".to_string());
            }
            fake
        }

        pub fn add_branch(&self, branch: &str) {
            self.inner.lock().branches.insert(branch.to_string());
        }

        pub fn set_commit_message(&self, rev: &str, message: &str) {
            self.inner
                .lock()
                .messages
                .insert(rev.to_string(), message.to_string());
        }

        /// Script a conflict between `branch` and `target`.
        pub fn set_conflict(&self, branch: &str, target: &str, files: &[&str]) {
            self.inner.lock().conflicts.insert(
                (branch.to_string(), target.to_string()),
                files.iter().map(|f| f.to_string()).collect(),
            );
        }

        /// Remove every scripted conflict (e.g. after a rebase).
        pub fn clear_conflicts(&self) {
            let mut inner = self.inner.lock();
            inner.conflicts.clear();
            inner.current_conflict.clear();
        }

        /// Script `rev` as an ancestor of `descendant`.
        pub fn set_ancestor(&self, rev: &str, descendant: &str) {
            self.inner
                .lock()
                .ancestors
                .insert((rev.to_string(), descendant.to_string()));
        }

        pub fn set_fail_pull(&self, fail: bool) {
            self.inner.lock().fail_pull = fail;
        }

        /// (branch, target, message) tuples of completed squash merges.
        pub fn merges(&self) -> Vec<(String, String, String)> {
            self.inner.lock().merges.clone()
        }

        pub fn pushes(&self) -> Vec<(String, String)> {
            self.inner.lock().pushes.clone()
        }

        pub fn deleted_branches(&self) -> Vec<String> {
            self.inner.lock().deleted_branches.clone()
        }

        pub fn deleted_remote_branches(&self) -> Vec<String> {
            self.inner.lock().deleted_remote_branches.clone()
        }
    }

    #[async_trait]
    impl GitAdapter for FakeGit {
        async fn init(&self, _repo: &Path) -> Result<(), GitError> {
            Ok(())
        }

        async fn clone_shared(&self, _source: &Path, _dest: &Path) -> Result<(), GitError> {
            Ok(())
        }

        async fn worktree_add(
            &self,
            _repo: &Path,
            _path: &Path,
            branch: &str,
            _start_point: &str,
        ) -> Result<(), GitError> {
            self.add_branch(branch);
            Ok(())
        }

        async fn worktree_remove(
            &self,
            _repo: &Path,
            _path: &Path,
            _force: bool,
        ) -> Result<(), GitError> {
            Ok(())
        }

        async fn checkout(&self, _repo: &Path, branch: &str) -> Result<(), GitError> {
            let mut inner = self.inner.lock();
            if !inner.branches.contains(branch) {
                return Err(GitError::Command {
                    op: "checkout",
                    stderr: format!("pathspec '{branch}' did not match"),
                });
            }
            inner.checked_out = branch.to_string();
            Ok(())
        }

        async fn pull(&self, _repo: &Path, _remote: &str, _branch: &str) -> Result<(), GitError> {
            if self.inner.lock().fail_pull {
                return Err(GitError::Command {
                    op: "pull",
                    stderr: "could not resolve host".to_string(),
                });
            }
            Ok(())
        }

        async fn fetch(&self, _repo: &Path, _remote: &str) -> Result<(), GitError> {
            Ok(())
        }

        async fn rev_parse(&self, _repo: &Path, rev: &str) -> Result<String, GitError> {
            // Deterministic: the same rev always resolves to the same sha,
            // so tests can pre-compute ancestor relations.
            Ok(format!("{:032x}00000000", fnv(rev)))
        }

        async fn branch_list(&self, _repo: &Path) -> Result<Vec<String>, GitError> {
            Ok(self.inner.lock().branches.iter().cloned().collect())
        }

        async fn remotes(&self, _repo: &Path) -> Result<Vec<String>, GitError> {
            Ok(self.inner.lock().remotes.clone())
        }

        async fn squash_merge(
            &self,
            _repo: &Path,
            branch: &str,
            message: &str,
        ) -> Result<(), GitError> {
            let mut inner = self.inner.lock();
            let target = inner.checked_out.clone();
            if let Some(files) = inner
                .conflicts
                .get(&(branch.to_string(), target.clone()))
                .cloned()
            {
                inner.current_conflict = files;
                return Err(GitError::Command {
                    op: "merge",
                    stderr: "Automatic merge failed; fix conflicts".to_string(),
                });
            }
            inner
                .merges
                .push((branch.to_string(), target, message.to_string()));
            Ok(())
        }

        async fn merge_abort(&self, _repo: &Path) -> Result<(), GitError> {
            self.inner.lock().current_conflict.clear();
            Ok(())
        }

        async fn conflict_files(&self, _repo: &Path) -> Result<Vec<String>, GitError> {
            Ok(self.inner.lock().current_conflict.clone())
        }

        async fn merge_would_conflict(
            &self,
            _repo: &Path,
            branch: &str,
            target: &str,
        ) -> Result<bool, GitError> {
            Ok(self
                .inner
                .lock()
                .conflicts
                .contains_key(&(branch.to_string(), target.to_string())))
        }

        async fn push(&self, _repo: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
            self.inner
                .lock()
                .pushes
                .push((remote.to_string(), branch.to_string()));
            Ok(())
        }

        async fn delete_branch(&self, _repo: &Path, branch: &str) -> Result<(), GitError> {
            let mut inner = self.inner.lock();
            inner.branches.remove(branch);
            inner.deleted_branches.push(branch.to_string());
            Ok(())
        }

        async fn delete_remote_branch(
            &self,
            _repo: &Path,
            _remote: &str,
            branch: &str,
        ) -> Result<(), GitError> {
            self.inner
                .lock()
                .deleted_remote_branches
                .push(branch.to_string());
            Ok(())
        }

        async fn is_ancestor(
            &self,
            _repo: &Path,
            ancestor: &str,
            descendant: &str,
        ) -> Result<bool, GitError> {
            Ok(self
                .inner
                .lock()
                .ancestors
                .contains(&(ancestor.to_string(), descendant.to_string())))
        }

        async fn commit_message(&self, _repo: &Path, rev: &str) -> Result<String, GitError> {
            Ok(self
                .inner
                .lock()
                .messages
                .get(rev)
                .cloned()
                .unwrap_or_else(|| format!("work from {rev}")))
        }

        async fn default_branch(&self, _repo: &Path) -> Result<String, GitError> {
            Ok("main".to_string())
        }
    }

    fn fnv(input: &str) -> u128 {
        let mut hash: u128 = 0x6c62_272e_07bb_0142_62b8_2175_6295_c58d;
        for byte in input.as_bytes() {
            hash ^= u128::from(*byte);
            hash = hash.wrapping_mul(0x0000_0000_0100_0000_0000_0000_0000_013b);
        }
        hash
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
