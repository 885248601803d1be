// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal multiplexer session adapter.
//!
//! Agents run inside tmux sessions named after their address (see
//! `gt_core::address`). The supervisor only ever needs liveness, pane
//! pids, creation time, key injection, and teardown.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::subprocess::{run_with_timeout, stderr_trimmed, stdout_trimmed, MUX_TIMEOUT};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("mux: {0}")]
    Subprocess(#[from] crate::subprocess::SubprocessError),
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("mux {op} failed: {stderr}")]
    Mux { op: &'static str, stderr: String },
}

/// One live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    /// Multiplexer-internal id (tmux `$N`).
    pub internal_id: String,
}

#[async_trait]
pub trait SessionAdapter: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError>;
    async fn has_session(&self, name: &str) -> Result<bool, SessionError>;
    async fn new_session(
        &self,
        name: &str,
        cwd: &Path,
        command: Option<&str>,
    ) -> Result<(), SessionError>;
    async fn kill_session(&self, name: &str) -> Result<(), SessionError>;
    /// Type literal keys followed by Enter.
    async fn send_keys(&self, name: &str, keys: &str) -> Result<(), SessionError>;
    /// Send Ctrl-C without a trailing Enter.
    async fn send_interrupt(&self, name: &str) -> Result<(), SessionError>;
    /// Root pid of each pane in the session.
    async fn pane_pids(&self, name: &str) -> Result<Vec<u32>, SessionError>;
    /// Unix epoch seconds at which the session was created.
    async fn created_at_epoch(&self, name: &str) -> Result<i64, SessionError>;
}

/// The real adapter, shelling out to `tmux`.
#[derive(Clone, Default)]
pub struct TmuxSessions;

impl TmuxSessions {
    pub fn new() -> Self {
        Self
    }

    async fn tmux(&self, op: &'static str, args: &[&str]) -> Result<std::process::Output, SessionError> {
        debug!(op, ?args, "tmux call");
        let mut cmd = Command::new("tmux");
        cmd.args(args);
        let output = run_with_timeout(cmd, MUX_TIMEOUT, "tmux").await?;
        Ok(output)
    }

    async fn tmux_ok(&self, op: &'static str, args: &[&str]) -> Result<(), SessionError> {
        let output = self.tmux(op, args).await?;
        if !output.status.success() {
            return Err(SessionError::Mux {
                op,
                stderr: stderr_trimmed(&output),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SessionAdapter for TmuxSessions {
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError> {
        let output = self
            .tmux(
                "list-sessions",
                &["list-sessions", "-F", "#{session_name}:#{session_id}"],
            )
            .await?;
        // "no server running" exits non-zero; that just means zero sessions
        if !output.status.success() {
            return Ok(Vec::new());
        }
        Ok(stdout_trimmed(&output)
            .lines()
            .filter_map(|line| {
                let (name, id) = line.rsplit_once(':')?;
                Some(SessionInfo {
                    name: name.to_string(),
                    internal_id: id.to_string(),
                })
            })
            .collect())
    }

    async fn has_session(&self, name: &str) -> Result<bool, SessionError> {
        let output = self
            .tmux("has-session", &["has-session", "-t", name])
            .await?;
        Ok(output.status.success())
    }

    async fn new_session(
        &self,
        name: &str,
        cwd: &Path,
        command: Option<&str>,
    ) -> Result<(), SessionError> {
        let cwd = cwd.display().to_string();
        let mut args = vec!["new-session", "-d", "-s", name, "-c", &cwd];
        if let Some(command) = command {
            args.push(command);
        }
        self.tmux_ok("new-session", &args).await
    }

    async fn kill_session(&self, name: &str) -> Result<(), SessionError> {
        self.tmux_ok("kill-session", &["kill-session", "-t", name])
            .await
    }

    async fn send_keys(&self, name: &str, keys: &str) -> Result<(), SessionError> {
        self.tmux_ok("send-keys", &["send-keys", "-t", name, keys, "Enter"])
            .await
    }

    async fn send_interrupt(&self, name: &str) -> Result<(), SessionError> {
        self.tmux_ok("send-keys", &["send-keys", "-t", name, "C-c"])
            .await
    }

    async fn pane_pids(&self, name: &str) -> Result<Vec<u32>, SessionError> {
        let output = self
            .tmux(
                "list-panes",
                &["list-panes", "-t", name, "-F", "#{pane_pid}"],
            )
            .await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(stdout_trimmed(&output)
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect())
    }

    async fn created_at_epoch(&self, name: &str) -> Result<i64, SessionError> {
        let output = self
            .tmux(
                "display-message",
                &["display-message", "-p", "-t", name, "#{session_created}"],
            )
            .await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(name.to_string()));
        }
        stdout_trimmed(&output)
            .parse()
            .map_err(|_| SessionError::NotFound(name.to_string()))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSessions;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct FakeSession {
        internal_id: String,
        created_at: i64,
        pids: Vec<u32>,
        sent_keys: Vec<String>,
        interrupts: u32,
    }

    #[derive(Default)]
    struct Inner {
        sessions: BTreeMap<String, FakeSession>,
        killed: Vec<String>,
        next_id: u64,
        now_epoch: i64,
    }

    /// In-memory session adapter recording kills and key sends.
    #[derive(Clone, Default)]
    pub struct FakeSessions {
        inner: Arc<Mutex<Inner>>,
    }

    impl FakeSessions {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pretend `name` is running, created at `created_at` epoch
        /// seconds with the given pane pids.
        pub fn spawn(&self, name: &str, created_at: i64, pids: &[u32]) {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let internal_id = format!("${}", inner.next_id);
            inner.sessions.insert(
                name.to_string(),
                FakeSession {
                    internal_id,
                    created_at,
                    pids: pids.to_vec(),
                    sent_keys: Vec::new(),
                    interrupts: 0,
                },
            );
        }

        pub fn set_now(&self, epoch: i64) {
            self.inner.lock().now_epoch = epoch;
        }

        /// Session names killed so far, in kill order.
        pub fn killed(&self) -> Vec<String> {
            self.inner.lock().killed.clone()
        }

        pub fn keys_sent_to(&self, name: &str) -> Vec<String> {
            self.inner
                .lock()
                .sessions
                .get(name)
                .map(|s| s.sent_keys.clone())
                .unwrap_or_default()
        }

        pub fn interrupts_sent_to(&self, name: &str) -> u32 {
            self.inner
                .lock()
                .sessions
                .get(name)
                .map(|s| s.interrupts)
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl SessionAdapter for FakeSessions {
        async fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError> {
            Ok(self
                .inner
                .lock()
                .sessions
                .iter()
                .map(|(name, s)| SessionInfo {
                    name: name.clone(),
                    internal_id: s.internal_id.clone(),
                })
                .collect())
        }

        async fn has_session(&self, name: &str) -> Result<bool, SessionError> {
            Ok(self.inner.lock().sessions.contains_key(name))
        }

        async fn new_session(
            &self,
            name: &str,
            _cwd: &Path,
            _command: Option<&str>,
        ) -> Result<(), SessionError> {
            let now = self.inner.lock().now_epoch;
            self.spawn(name, now, &[]);
            Ok(())
        }

        async fn kill_session(&self, name: &str) -> Result<(), SessionError> {
            let mut inner = self.inner.lock();
            inner.killed.push(name.to_string());
            inner.sessions.remove(name);
            Ok(())
        }

        async fn send_keys(&self, name: &str, keys: &str) -> Result<(), SessionError> {
            let mut inner = self.inner.lock();
            let session = inner
                .sessions
                .get_mut(name)
                .ok_or_else(|| SessionError::NotFound(name.to_string()))?;
            session.sent_keys.push(keys.to_string());
            Ok(())
        }

        async fn send_interrupt(&self, name: &str) -> Result<(), SessionError> {
            let mut inner = self.inner.lock();
            let session = inner
                .sessions
                .get_mut(name)
                .ok_or_else(|| SessionError::NotFound(name.to_string()))?;
            session.interrupts += 1;
            Ok(())
        }

        async fn pane_pids(&self, name: &str) -> Result<Vec<u32>, SessionError> {
            self.inner
                .lock()
                .sessions
                .get(name)
                .map(|s| s.pids.clone())
                .ok_or_else(|| SessionError::NotFound(name.to_string()))
        }

        async fn created_at_epoch(&self, name: &str) -> Result<i64, SessionError> {
            self.inner
                .lock()
                .sessions
                .get(name)
                .map(|s| s.created_at)
                .ok_or_else(|| SessionError::NotFound(name.to_string()))
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
