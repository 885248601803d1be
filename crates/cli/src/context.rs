// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared command context: town discovery, rig selection, and adapter
//! wiring.

use anyhow::{bail, Context as _};
use gt_adapters::{BeadsCli, GitCli, TmuxSessions};
use gt_core::clock::SystemClock;
use gt_core::polecat::RigName;
use gt_engine::polecats::Manager;
use gt_engine::town::{RigConfig, TownPaths};
use gt_engine::EventLog;
use gt_mail::channels::MessagingConfig;
use gt_mail::router::Router;
use gt_mail::store::JsonlMailbox;
use std::path::PathBuf;
use std::sync::Arc;

pub struct Context {
    pub town: TownPaths,
    pub rig: String,
    pub config: RigConfig,
    pub tracker: Arc<BeadsCli>,
    pub git: Arc<GitCli>,
    pub sessions: Arc<TmuxSessions>,
    pub store: Arc<JsonlMailbox>,
    pub clock: SystemClock,
}

impl Context {
    /// Discover the town root (walking up from the cwd unless given)
    /// and select a rig.
    pub fn discover(town: Option<PathBuf>, rig: Option<String>) -> anyhow::Result<Self> {
        let root = match town {
            Some(root) => root,
            None => {
                let mut dir = std::env::current_dir().context("cwd unavailable")?;
                loop {
                    if TownPaths::is_town_root(&dir) {
                        break dir;
                    }
                    if !dir.pop() {
                        bail!("not inside a town (no mayor/town.json found); pass --town");
                    }
                }
            }
        };
        let town = TownPaths::new(&root);

        let rig = match rig {
            Some(rig) => rig,
            None => {
                let mut rigs = discover_rigs(&town)?;
                match (rigs.pop(), rigs.is_empty()) {
                    (Some(only), true) => only,
                    (Some(_), false) => bail!("multiple rigs in town; pass --rig"),
                    (None, _) => bail!("no rigs in town"),
                }
            }
        };

        let config = RigConfig::load(&town, &rig)
            .with_context(|| format!("loading rig config for {rig}"))?;
        let tracker = Arc::new(BeadsCli::new(town.root()));
        let store = Arc::new(JsonlMailbox::new(town.mail_root()));

        Ok(Self {
            town,
            rig,
            config,
            tracker,
            git: Arc::new(GitCli::new()),
            sessions: Arc::new(TmuxSessions::new()),
            store,
            clock: SystemClock,
        })
    }

    pub fn router(&self) -> anyhow::Result<Arc<Router>> {
        let messaging = MessagingConfig::load(&self.town.messaging_config())
            .context("loading messaging.json")?;
        Ok(Arc::new(Router::new(
            self.store.clone(),
            self.tracker.clone(),
            messaging,
        )))
    }

    pub fn manager(&self) -> Arc<Manager<SystemClock>> {
        Arc::new(
            Manager::new(
                self.town.clone(),
                RigName::new(&self.rig),
                self.git.clone(),
                self.tracker.clone(),
                self.sessions.clone(),
                self.clock.clone(),
            )
            .with_branch_template(self.config.branch_template.clone()),
        )
    }

    pub fn events(&self) -> EventLog {
        EventLog::new(self.town.events_log())
    }

    /// The caller's mail identity (role mailboxes use their canonical
    /// address; humans fall back to overseer).
    pub fn sender(&self) -> String {
        std::env::var("GT_IDENTITY").unwrap_or_else(|_| "overseer".to_string())
    }
}

/// Rigs are the non-hidden town subdirectories that carry a polecats/
/// or mayor/ directory.
fn discover_rigs(town: &TownPaths) -> anyhow::Result<Vec<String>> {
    let mut rigs = Vec::new();
    for entry in std::fs::read_dir(town.root()).context("reading town root")? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "mayor" || name == "config" {
            continue;
        }
        let path = entry.path();
        if path.join("mayor").is_dir() || path.join("polecats").is_dir() {
            rigs.push(name);
        }
    }
    rigs.sort();
    Ok(rigs)
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
