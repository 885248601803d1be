// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Themed worker name pool.
//!
//! Each rig draws polecat names from one themed, ordered, finite list.
//! The theme is keyed by a stable hash of the rig name so every host
//! independently picks the same theme for the same rig. Pool order is
//! authoritative: allocation is deterministic given the in-use set.

use crate::polecat::PolecatName;
use std::collections::BTreeSet;
use thiserror::Error;

/// A themed, ordered name list.
pub struct Theme {
    pub name: &'static str,
    pub names: &'static [&'static str],
}

/// Built-in themes. Order matters: the rig-name hash indexes into this
/// slice, so appending new themes is safe but reordering is not.
pub const THEMES: &[Theme] = &[
    Theme {
        name: "roadwar",
        names: &[
            "toast", "nux", "capable", "furiosa", "slit", "ace", "dag", "cheedo", "angharad",
            "valkyrie", "rictus", "dementus", "scrotus", "morsov", "corpus", "doof",
        ],
    },
    Theme {
        name: "dustbowl",
        names: &[
            "dusty", "rattler", "mesa", "sage", "flint", "cinder", "gulch", "yucca", "sierra",
            "bandit", "coyote", "vulture", "tumble", "spur", "caliche", "arroyo",
        ],
    },
    Theme {
        name: "reef",
        names: &[
            "coral", "moray", "urchin", "kelp", "drift", "tide", "briny", "anemone", "barnacle",
            "cuttle", "grouper", "lagoon", "marlin", "nautilus", "pearl", "sargasso",
        ],
    },
];

/// Stable 64-bit FNV-1a. `DefaultHasher` is not guaranteed stable across
/// releases, and theme selection must agree across hosts.
fn fnv1a(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in input.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// The theme a rig's pool uses.
pub fn theme_for_rig(rig: &str) -> &'static Theme {
    let idx = (fnv1a(rig) % THEMES.len() as u64) as usize;
    &THEMES[idx]
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("name pool exhausted ({0} names, all in use)")]
    Exhausted(usize),
    #[error("unknown theme {0:?}")]
    UnknownTheme(String),
}

/// Per-name reconciliation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameState {
    Available,
    InUse,
    /// Orphan session observed: the session is killed and the name stays
    /// reserved until a later reconcile confirms the session is gone
    /// (tmux kills complete asynchronously).
    OrphanKilled,
}

/// Result of [`NamePool::reconcile`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Sessions that must be killed (name had a session but no directory).
    pub kill_sessions: Vec<PolecatName>,
}

/// Allocation state for one rig's pool.
pub struct NamePool {
    theme: &'static str,
    names: Vec<&'static str>,
    in_use: BTreeSet<String>,
    quarantined: BTreeSet<String>,
}

impl NamePool {
    /// Pool for a rig, theme chosen by rig-name hash.
    pub fn for_rig(rig: &str) -> Self {
        Self::from_theme(theme_for_rig(rig))
    }

    /// Pool with an explicitly named theme.
    pub fn with_theme(theme: &str) -> Result<Self, PoolError> {
        THEMES
            .iter()
            .find(|t| t.name == theme)
            .map(Self::from_theme)
            .ok_or_else(|| PoolError::UnknownTheme(theme.to_string()))
    }

    fn from_theme(theme: &'static Theme) -> Self {
        Self {
            theme: theme.name,
            names: theme.names.to_vec(),
            in_use: BTreeSet::new(),
            quarantined: BTreeSet::new(),
        }
    }

    pub fn theme(&self) -> &str {
        self.theme
    }

    pub fn capacity(&self) -> usize {
        self.names.len()
    }

    /// First pool-order name that is neither in use nor quarantined.
    pub fn allocate(&mut self) -> Result<PolecatName, PoolError> {
        let next = self
            .names
            .iter()
            .find(|n| !self.in_use.contains(**n) && !self.quarantined.contains(**n));
        match next {
            Some(name) => {
                self.in_use.insert((*name).to_string());
                Ok(PolecatName::new(*name))
            }
            None => Err(PoolError::Exhausted(self.names.len())),
        }
    }

    /// Clear the in-use flag. No-op if already free.
    pub fn release(&mut self, name: &str) {
        self.in_use.remove(name);
        self.quarantined.remove(name);
    }

    /// Sorted list of in-use names.
    pub fn active_names(&self) -> Vec<PolecatName> {
        self.in_use.iter().map(PolecatName::new).collect()
    }

    /// Reconcile pool state against observed worker directories and live
    /// sessions.
    ///
    /// | has-dir | has-session | result |
    /// |---------|-------------|--------|
    /// | no      | no          | available |
    /// | yes     | no          | in use (worker between sessions) |
    /// | no      | yes         | orphan: kill session, reserve name |
    /// | yes     | yes         | in use |
    ///
    /// The directory set is authoritative for the in-use state; sessions
    /// without directories are always killed.
    pub fn reconcile<S: AsRef<str>>(&mut self, dirs: &[S], sessions: &[S]) -> ReconcileOutcome {
        let dirs: BTreeSet<&str> = dirs.iter().map(AsRef::as_ref).collect();
        let sessions: BTreeSet<&str> = sessions.iter().map(AsRef::as_ref).collect();

        let mut outcome = ReconcileOutcome::default();
        self.in_use.clear();
        let mut quarantine = BTreeSet::new();

        for name in &self.names {
            match (dirs.contains(name), sessions.contains(name)) {
                (true, _) => {
                    self.in_use.insert((*name).to_string());
                }
                (false, true) => {
                    outcome.kill_sessions.push(PolecatName::new(*name));
                    quarantine.insert((*name).to_string());
                }
                (false, false) => {}
            }
        }

        self.quarantined = quarantine;
        outcome
    }

    /// Per-name verdict after the last reconcile.
    pub fn state_of(&self, name: &str) -> NameState {
        if self.in_use.contains(name) {
            NameState::InUse
        } else if self.quarantined.contains(name) {
            NameState::OrphanKilled
        } else {
            NameState::Available
        }
    }
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;
