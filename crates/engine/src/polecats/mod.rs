// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polecat manager: provisions, tracks, and removes workers.
//!
//! A worker is a name from the rig's pool, an isolated worktree sharing
//! the rig's object store, a work branch, and an agent-identity item in
//! the tracker. The session running inside is transient and owned by
//! the supervisor, not by this module.

mod reconcile;

use crate::lock::IdentityLock;
use crate::town::TownPaths;
use gt_adapters::git::{GitAdapter, GitError};
use gt_adapters::session::{SessionAdapter, SessionError};
use gt_adapters::tracker::{CreateRequest, TrackerAdapter, TrackerError, UpdateRequest};
use gt_core::clock::Clock;
use gt_core::issue::{BeadId, IssueType};
use gt_core::names::{NamePool, PoolError};
use gt_core::polecat::{CleanupStatus, Polecat, PolecatName, PolecatState, RigName, SessionId};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Gitignore patterns every worker clone must carry.
const REQUIRED_IGNORES: &[&str] = &[".runtime/", ".claude/", ".beads/", ".logs/"];

/// Worker metadata persisted inside the clone.
const POLECAT_META: &str = ".runtime/polecat.json";

/// Default branch templates.
const BRANCH_TEMPLATE_WITH_ISSUE: &str = "polecat/{name}/{issue}@{timestamp}";
const BRANCH_TEMPLATE_BARE: &str = "polecat/{name}-{timestamp}";

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("worker io: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker metadata corrupt: {0}")]
    Meta(#[from] serde_json::Error),
    #[error("worker not found: {0}")]
    NotFound(String),
    #[error("worker {name} already exists at {path}")]
    AlreadyExists { name: String, path: String },
    #[error("worker {name} is not clean ({status}); use force to remove anyway")]
    NotClean { name: String, status: CleanupStatus },
    #[error(transparent)]
    Lock(#[from] crate::lock::LockError),
}

/// Options for [`Manager::add_with_options`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Work item to assign; shapes the branch name.
    pub work_item: Option<BeadId>,
    /// Branch template override (defaults come from rig config, then
    /// the built-ins).
    pub branch_template: Option<String>,
    /// Start point for the work branch (default: the rig's default
    /// branch).
    pub start_point: Option<String>,
}

pub struct Manager<C: Clock> {
    town: TownPaths,
    rig: RigName,
    git: Arc<dyn GitAdapter>,
    tracker: Arc<dyn TrackerAdapter>,
    sessions: Arc<dyn SessionAdapter>,
    pool: Mutex<NamePool>,
    clock: C,
    branch_template: Option<String>,
}

impl<C: Clock> Manager<C> {
    pub fn new(
        town: TownPaths,
        rig: RigName,
        git: Arc<dyn GitAdapter>,
        tracker: Arc<dyn TrackerAdapter>,
        sessions: Arc<dyn SessionAdapter>,
        clock: C,
    ) -> Self {
        let pool = NamePool::for_rig(rig.as_str());
        Self {
            town,
            rig,
            git,
            tracker,
            sessions,
            pool: Mutex::new(pool),
            clock,
            branch_template: None,
        }
    }

    pub fn with_branch_template(mut self, template: Option<String>) -> Self {
        self.branch_template = template;
        self
    }

    pub fn rig(&self) -> &RigName {
        &self.rig
    }

    pub fn town(&self) -> &TownPaths {
        &self.town
    }

    pub fn pool(&self) -> &Mutex<NamePool> {
        &self.pool
    }

    fn agent_bead_id(&self, name: &str) -> BeadId {
        BeadId::new(format!("{}-agent-{name}", self.rig))
    }

    fn address(&self, name: &str) -> String {
        format!("{}/polecats/{name}", self.rig)
    }

    fn session_id(&self, name: &str) -> SessionId {
        SessionId::new(format!("gt-{}-{name}", self.rig))
    }

    /// Allocate a name from the pool and provision a worker for it.
    pub async fn add(&self, opts: AddOptions) -> Result<Polecat, ManagerError> {
        let name = self.pool.lock().allocate()?;
        match self.add_named(&name, opts).await {
            Ok(polecat) => Ok(polecat),
            Err(err) => {
                // Provisioning failed: the name goes back to the pool
                self.pool.lock().release(name.as_str());
                Err(err)
            }
        }
    }

    /// Provision a worker under a specific (already reserved) name.
    pub async fn add_named(
        &self,
        name: &PolecatName,
        opts: AddOptions,
    ) -> Result<Polecat, ManagerError> {
        let clone_path = self.town.polecat_dir(self.rig.as_str(), name.as_str());
        if clone_path.exists() {
            return Err(ManagerError::AlreadyExists {
                name: name.to_string(),
                path: clone_path.display().to_string(),
            });
        }

        let source = self.town.mayor_rig(self.rig.as_str());
        let branch = self.build_branch_name(name.as_str(), opts.work_item.as_ref(), opts.branch_template.as_deref());
        let start_point = match opts.start_point {
            Some(start) => start,
            None => self.git.default_branch(&source).await?,
        };

        if let Some(parent) = clone_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Worktree off the mayor checkout: shares the object store, no
        // redownload.
        self.git
            .worktree_add(&source, &clone_path, &branch, &start_point)
            .await?;
        std::fs::create_dir_all(&clone_path)?;

        self.copy_agents_guide(&clone_path)?;
        self.copy_overlay(&clone_path)?;
        ensure_gitignore(&clone_path)?;

        let now = self.clock.rfc3339();
        let polecat = Polecat {
            name: name.clone(),
            rig: self.rig.clone(),
            clone_path: clone_path.clone(),
            branch,
            work_item: opts.work_item.clone(),
            state: PolecatState::Working,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        self.write_meta(&polecat)?;

        // Register the identity in the tracker so mail routing can
        // validate it.
        let mut description = format!("address: {}\nstate: working", self.address(name.as_str()));
        if let Some(item) = &opts.work_item {
            description.push_str(&format!("\nwork_item: {item}"));
        }
        self.tracker
            .create(CreateRequest {
                title: format!("polecat {}/{}", self.rig, name),
                issue_type: Some(IssueType::AgentIdentity),
                description: Some(description),
                id: Some(self.agent_bead_id(name.as_str())),
                force: true,
                ..Default::default()
            })
            .await?;

        info!(worker = %name, branch = %polecat.branch, "provisioned polecat");
        Ok(polecat)
    }

    /// Remove a worker. Refuses when the worker is not clean unless
    /// `force`.
    pub async fn remove(&self, name: &str, force: bool) -> Result<(), ManagerError> {
        let clone_path = self.town.polecat_dir(self.rig.as_str(), name);
        if !clone_path.exists() {
            return Err(ManagerError::NotFound(name.to_string()));
        }

        if !force {
            let status = self.cleanup_status(name).await;
            if status.work_at_risk() {
                return Err(ManagerError::NotClean {
                    name: name.to_string(),
                    status,
                });
            }
        }

        let session = self.session_id(name);
        if self.sessions.has_session(session.as_str()).await? {
            self.sessions.kill_session(session.as_str()).await?;
        }

        let source = self.town.mayor_rig(self.rig.as_str());
        if let Err(err) = self.git.worktree_remove(&source, &clone_path, force).await {
            warn!(worker = name, error = %err, "worktree remove failed, deleting directory");
            std::fs::remove_dir_all(&clone_path)?;
        }
        // Worktree remove can leave the directory when git did not own it
        if clone_path.exists() {
            std::fs::remove_dir_all(&clone_path)?;
        }

        if let Err(err) = self.tracker.close(&self.agent_bead_id(name), Some("removed")).await {
            if !err.is_not_found() {
                return Err(err.into());
            }
        }

        self.pool.lock().release(name);
        info!(worker = name, "removed polecat");
        Ok(())
    }

    /// Load a worker. Lifecycle state is derived from the tracker; when
    /// the tracker is unreachable the worker is assumed Working.
    pub async fn get(&self, name: &str) -> Result<Polecat, ManagerError> {
        let clone_path = self.town.polecat_dir(self.rig.as_str(), name);
        let meta_path = clone_path.join(POLECAT_META);
        let content = std::fs::read_to_string(&meta_path)
            .map_err(|_| ManagerError::NotFound(name.to_string()))?;
        let mut polecat: Polecat = serde_json::from_str(&content)?;

        polecat.state = match self.tracker.show(&self.agent_bead_id(name)).await {
            Ok(item) => PolecatState::parse(item.field("state").unwrap_or("working")),
            Err(_) => PolecatState::Working,
        };
        Ok(polecat)
    }

    /// Summaries of every worker directory (hidden entries skipped).
    pub async fn list(&self) -> Result<Vec<Polecat>, ManagerError> {
        let dir = self.town.polecats_dir(self.rig.as_str());
        let mut names = Vec::new();
        match std::fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry?;
                    let file_name = entry.file_name();
                    let name = file_name.to_string_lossy();
                    if name.starts_with('.') || !entry.path().is_dir() {
                        continue;
                    }
                    names.push(name.to_string());
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        names.sort();

        let mut workers = Vec::new();
        for name in names {
            match self.get(&name).await {
                Ok(polecat) => workers.push(polecat),
                Err(ManagerError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(workers)
    }

    /// The worker's cleanup status from its agent-identity item.
    pub async fn cleanup_status(&self, name: &str) -> CleanupStatus {
        match self.tracker.show(&self.agent_bead_id(name)).await {
            Ok(item) => CleanupStatus::parse(item.field("cleanup_status")),
            Err(_) => CleanupStatus::Unknown,
        }
    }

    /// Clear the worker's active merge-request pointer (refinery calls
    /// this after a merge lands).
    pub async fn clear_active_mr(&self, name: &str) -> Result<(), ManagerError> {
        let bead = self.agent_bead_id(name);
        let item = match self.tracker.show(&bead).await {
            Ok(item) => item,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let description = gt_core::fields::set_field(&item.description, "active_mr", "");
        self.tracker
            .update(
                &bead,
                UpdateRequest {
                    description: Some(description),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// The lock handle for a worker.
    pub fn lock_for(&self, name: &str) -> IdentityLock {
        IdentityLock::for_worker(&self.town.polecat_dir(self.rig.as_str(), name))
    }

    /// Expand the branch template for a worker.
    ///
    /// Variables: `{user}`, `{year}`, `{month}`, `{day}`, `{hour}`,
    /// `{timestamp}`, `{name}`, `{issue}` (numeric tail), `{rig}`.
    pub fn build_branch_name(
        &self,
        name: &str,
        work_item: Option<&BeadId>,
        template_override: Option<&str>,
    ) -> String {
        let template = template_override
            .or(self.branch_template.as_deref())
            .unwrap_or(match work_item {
                Some(_) => BRANCH_TEMPLATE_WITH_ISSUE,
                None => BRANCH_TEMPLATE_BARE,
            });
        let now = self.clock.now_utc();
        let user = std::env::var("USER").unwrap_or_else(|_| "gt".to_string());
        template
            .replace("{user}", &user)
            .replace("{year}", &format!("{}", now.format("%Y")))
            .replace("{month}", &format!("{}", now.format("%m")))
            .replace("{day}", &format!("{}", now.format("%d")))
            .replace("{hour}", &format!("{}", now.format("%H")))
            .replace("{timestamp}", &now.timestamp().to_string())
            .replace("{name}", name)
            .replace("{issue}", work_item.map(|b| b.tail()).unwrap_or_default())
            .replace("{rig}", self.rig.as_str())
    }

    fn write_meta(&self, polecat: &Polecat) -> Result<(), ManagerError> {
        let path = polecat.clone_path.join(POLECAT_META);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(polecat)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// AGENTS.md comes from the rig repo when committed, else from the
    /// rig's overlay directory.
    fn copy_agents_guide(&self, clone_path: &Path) -> Result<(), ManagerError> {
        let in_repo = clone_path.join("AGENTS.md");
        if in_repo.exists() {
            return Ok(());
        }
        let overlay = self.town.overlay_dir(self.rig.as_str()).join("AGENTS.md");
        if overlay.exists() {
            std::fs::copy(&overlay, &in_repo)?;
        }
        Ok(())
    }

    /// Copy overlay files flat into the clone, never overwriting.
    fn copy_overlay(&self, clone_path: &Path) -> Result<(), ManagerError> {
        let overlay = self.town.overlay_dir(self.rig.as_str());
        let entries = match std::fs::read_dir(&overlay) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let dest = clone_path.join(entry.file_name());
            if !dest.exists() {
                std::fs::copy(entry.path(), &dest)?;
            }
        }
        Ok(())
    }
}

/// Append any missing required patterns to the clone's `.gitignore`.
fn ensure_gitignore(clone_path: &Path) -> std::io::Result<()> {
    let path = clone_path.join(".gitignore");
    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    let present: Vec<&str> = existing.lines().map(str::trim).collect();
    let mut updated = existing.clone();
    for pattern in REQUIRED_IGNORES {
        if !present.contains(pattern) {
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(pattern);
            updated.push('\n');
        }
    }
    if updated != existing {
        std::fs::write(&path, updated)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
