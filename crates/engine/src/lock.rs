// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker identity lock.
//!
//! At most one owning process per worker identity. The lock file lives
//! at `<worker>/.runtime/agent.lock` and records pid, acquisition time,
//! session id, and hostname. A lock is stale only when BOTH liveness
//! signals fail: the pid is dead AND the session id is absent from the
//! live-session set. Single-condition staleness must never trigger
//! cleanup: a detached but still-live agent has a dead parent pid and a
//! live session.

use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const LOCK_DIR: &str = ".runtime";
pub const LOCK_FILE: &str = "agent.lock";

/// Lock file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    /// RFC3339 UTC.
    pub acquired_at: String,
    pub session_id: String,
    pub hostname: String,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("identity is locked by pid {} (session {})", .holder.pid, .holder.session_id)]
    Locked { holder: LockInfo },
    #[error("lock io: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file corrupt at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// True when the process exists (signal 0 probe).
pub fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        // EPERM means the process exists but belongs to someone else
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Handle on one worker's lock file.
pub struct IdentityLock {
    path: PathBuf,
}

impl IdentityLock {
    /// Lock handle for a worker directory.
    pub fn for_worker(worker_dir: &Path) -> Self {
        Self {
            path: worker_dir.join(LOCK_DIR).join(LOCK_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current lock, if any.
    pub fn read(&self) -> Result<Option<LockInfo>, LockError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| LockError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Stale iff pid dead AND session absent. Both conditions required.
    pub fn is_stale(info: &LockInfo, live_sessions: &HashSet<String>) -> bool {
        !pid_alive(info.pid) && !live_sessions.contains(&info.session_id)
    }

    /// Acquire (or refresh) the lock for the current process.
    pub fn acquire(
        &self,
        session_id: &str,
        now: &str,
        live_sessions: &HashSet<String>,
    ) -> Result<(), LockError> {
        let my_pid = std::process::id();
        match self.read()? {
            Some(existing) if existing.pid == my_pid => {
                // Ours: refresh the timestamp
                debug!(path = %self.path.display(), "refreshing own lock");
            }
            Some(existing) if Self::is_stale(&existing, live_sessions) => {
                warn!(
                    path = %self.path.display(),
                    stale_pid = existing.pid,
                    stale_session = %existing.session_id,
                    "reclaiming stale lock"
                );
                std::fs::remove_file(&self.path)?;
            }
            Some(existing) => {
                return Err(LockError::Locked { holder: existing });
            }
            None => {}
        }

        self.write(&LockInfo {
            pid: my_pid,
            acquired_at: now.to_string(),
            session_id: session_id.to_string(),
            hostname: hostname(),
        })
    }

    /// Steps 1–3 of the acquire protocol only: succeeds on "not locked"
    /// or "locked by us".
    pub fn check(&self, live_sessions: &HashSet<String>) -> Result<(), LockError> {
        match self.read()? {
            None => Ok(()),
            Some(existing) if existing.pid == std::process::id() => Ok(()),
            Some(existing) if Self::is_stale(&existing, live_sessions) => Ok(()),
            Some(existing) => Err(LockError::Locked { holder: existing }),
        }
    }

    /// Remove the lock if we own it.
    pub fn release(&self) -> Result<(), LockError> {
        match self.read()? {
            Some(info) if info.pid == std::process::id() => {
                std::fs::remove_file(&self.path)?;
                Ok(())
            }
            Some(holder) => Err(LockError::Locked { holder }),
            None => Ok(()),
        }
    }

    /// Operator tool: remove regardless of ownership.
    pub fn force_release(&self) -> Result<(), LockError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomic write-then-rename.
    fn write(&self, info: &LockInfo) -> Result<(), LockError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("lock.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(info).map_err(|source| {
            LockError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Every `<dir>/.runtime/agent.lock` under `root`, depth-first.
pub fn find_all_locks(root: &Path) -> Result<Vec<PathBuf>, LockError> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if entry.file_name() == LOCK_DIR {
                let lock = path.join(LOCK_FILE);
                if lock.is_file() {
                    found.push(lock);
                }
            } else {
                stack.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Remove every lock under `root` that is stale by both conditions.
/// Returns the paths removed.
pub fn clean_stale_locks(
    root: &Path,
    live_sessions: &HashSet<String>,
) -> Result<Vec<PathBuf>, LockError> {
    let mut removed = Vec::new();
    for path in find_all_locks(root)? {
        let lock = IdentityLock { path: path.clone() };
        let Some(info) = lock.read()? else { continue };
        if IdentityLock::is_stale(&info, live_sessions) {
            std::fs::remove_file(&path)?;
            removed.push(path);
        }
    }
    Ok(removed)
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
