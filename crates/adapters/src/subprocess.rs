// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess invocation with timeouts.
//!
//! Every external call (git, tracker, tmux) goes through
//! [`run_with_timeout`] so a wedged child can never hang a control loop.
//! Timeouts are the caller's responsibility per call class.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Local git operations (worktree add, checkout, merge).
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);
/// Git operations that touch the network (clone, fetch, pull, push).
pub const GIT_REMOTE_TIMEOUT: Duration = Duration::from_secs(300);
/// Tracker CLI calls (embedded database, occasionally contended).
pub const TRACKER_TIMEOUT: Duration = Duration::from_secs(30);
/// Terminal multiplexer calls.
pub const MUX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label}: failed to spawn: {source}")]
    Spawn {
        label: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{label}: timed out after {timeout:?}")]
    Timeout {
        label: &'static str,
        timeout: Duration,
    },
}

/// Run a command, killing it on timeout.
///
/// A non-zero exit is not an error at this layer; callers inspect
/// `output.status` and classify on stderr where exit codes are ambiguous.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &'static str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    let fut = cmd.output();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Spawn { label, source }),
        Err(_) => Err(SubprocessError::Timeout { label, timeout }),
    }
}

/// Trimmed stderr of an output, for error messages and predicates.
pub fn stderr_trimmed(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Trimmed stdout of an output.
pub fn stdout_trimmed(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
