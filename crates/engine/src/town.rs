// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk town layout.
//!
//! ```text
//! <town>/<rig>/polecats/<name>/            worker worktree root
//! <town>/<rig>/polecats/<name>/.runtime/agent.lock
//! <town>/<rig>/mayor/rig/                  upstream checkout (clone source)
//! <town>/<rig>/refinery/rig/               refinery working checkout
//! <town>/<rig>/.runtime/overlay/           files copied into every worker
//! <town>/.beads-wisp/config/<rig>.json     local, never-replicated config
//! <town>/config/messaging.json             lists, queues, announces
//! <town>/.events.jsonl                     raw event log
//! <town>/.feed.jsonl                       curated event log
//! <town>/mayor/town.json                   workspace root marker
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Path arithmetic over a town root. Pure; nothing here touches disk
/// except [`TownPaths::is_town_root`].
#[derive(Debug, Clone)]
pub struct TownPaths {
    root: PathBuf,
}

impl TownPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A directory is a town root iff it carries the marker file.
    pub fn is_town_root(path: &Path) -> bool {
        path.join("mayor").join("town.json").is_file()
    }

    pub fn town_marker(&self) -> PathBuf {
        self.root.join("mayor").join("town.json")
    }

    pub fn rig(&self, rig: &str) -> PathBuf {
        self.root.join(rig)
    }

    pub fn polecats_dir(&self, rig: &str) -> PathBuf {
        self.rig(rig).join("polecats")
    }

    pub fn polecat_dir(&self, rig: &str, name: &str) -> PathBuf {
        self.polecats_dir(rig).join(name)
    }

    pub fn agent_lock(&self, rig: &str, name: &str) -> PathBuf {
        self.polecat_dir(rig, name).join(".runtime").join("agent.lock")
    }

    /// The rig's upstream checkout, used as the clone source.
    pub fn mayor_rig(&self, rig: &str) -> PathBuf {
        self.rig(rig).join("mayor").join("rig")
    }

    /// The refinery's working checkout; falls back to the mayor's when
    /// absent.
    pub fn refinery_rig(&self, rig: &str) -> PathBuf {
        self.rig(rig).join("refinery").join("rig")
    }

    pub fn refinery_checkout(&self, rig: &str) -> PathBuf {
        let own = self.refinery_rig(rig);
        if own.is_dir() {
            own
        } else {
            self.mayor_rig(rig)
        }
    }

    pub fn overlay_dir(&self, rig: &str) -> PathBuf {
        self.rig(rig).join(".runtime").join("overlay")
    }

    /// Local (never replicated) per-rig config layer.
    pub fn rig_config(&self, rig: &str) -> PathBuf {
        self.root
            .join(".beads-wisp")
            .join("config")
            .join(format!("{rig}.json"))
    }

    pub fn messaging_config(&self) -> PathBuf {
        self.root.join("config").join("messaging.json")
    }

    pub fn mail_root(&self) -> PathBuf {
        self.root.join(".mail")
    }

    pub fn events_log(&self) -> PathBuf {
        self.root.join(".events.jsonl")
    }

    pub fn feed_log(&self) -> PathBuf {
        self.root.join(".feed.jsonl")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(".logs")
    }
}

/// Local per-rig configuration (`<town>/.beads-wisp/config/<rig>.json`).
/// Never replicated between hosts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Branch template override for new workers.
    pub branch_template: Option<String>,
    /// Name-pool theme override (defaults to the rig-name hash).
    pub theme: Option<String>,
    pub refinery: crate::refinery::RefineryConfig,
    pub witness: crate::witness::WitnessConfig,
}

impl RigConfig {
    /// A missing config file is the default config, not an error.
    pub fn load(town: &TownPaths, rig: &str) -> Result<Self, std::io::Error> {
        let path = town.rig_config(rig);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[path = "town_tests.rs"]
mod tests;
