// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool reconciliation against observed directories and sessions.
//!
//! Runs at startup and whenever the supervisor loses confidence (e.g.
//! after a mass-death event). Directories are authoritative for the
//! in-use state; sessions without directories are always killed.

use super::{Manager, ManagerError};
use gt_core::clock::Clock;
use gt_core::names::ReconcileOutcome;
use tracing::{info, warn};

impl<C: Clock> Manager<C> {
    /// Session-name prefix for this rig's polecats.
    fn session_prefix(&self) -> String {
        format!("gt-{}-", self.rig())
    }

    /// Observed worker directory names (hidden entries skipped).
    fn observed_dirs(&self) -> Result<Vec<String>, ManagerError> {
        let dir = self.town.polecats_dir(self.rig.as_str());
        let mut names = Vec::new();
        match std::fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry?;
                    let file_name = entry.file_name();
                    let name = file_name.to_string_lossy();
                    if !name.starts_with('.') && entry.path().is_dir() {
                        names.push(name.to_string());
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(names)
    }

    /// Live polecat session names for this rig, mapped back to pool
    /// names.
    async fn observed_sessions(&self) -> Result<Vec<String>, ManagerError> {
        let prefix = self.session_prefix();
        Ok(self
            .sessions
            .list_sessions()
            .await?
            .into_iter()
            .filter_map(|s| s.name.strip_prefix(&prefix).map(str::to_string))
            // Role and crew sessions share the rig prefix but are not
            // pool names
            .filter(|suffix| {
                !matches!(suffix.as_str(), "witness" | "refinery" | "deacon")
                    && !suffix.starts_with("crew-")
            })
            .collect())
    }

    /// Reconcile the name pool with the observed world, killing orphan
    /// sessions.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, ManagerError> {
        let dirs = self.observed_dirs()?;
        let sessions = self.observed_sessions().await?;

        let outcome = self.pool.lock().reconcile(&dirs, &sessions);

        for name in &outcome.kill_sessions {
            let session = format!("{}{}", self.session_prefix(), name);
            info!(session = %session, "killing orphan session");
            if let Err(err) = self.sessions.kill_session(&session).await {
                // Kill failures are logged, not fatal: the next
                // reconcile sees the session again.
                warn!(session = %session, error = %err, "orphan session kill failed");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
