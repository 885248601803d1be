// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gt-engine: the Gas Town work lifecycle.
//!
//! Polecat provisioning and reconciliation, the refinery merge queue,
//! the witness safety handlers, convoy observation, molecule
//! instantiation, the cluster-wide merge slot, event logging, and the
//! orphan reaper.

pub mod convoy;
pub mod events;
pub mod lock;
pub mod molecule;
pub mod polecats;
pub mod reaper;
pub mod refinery;
pub mod slot;
pub mod town;
pub mod witness;

pub use convoy::check_convoys_for_issue;
pub use events::{Curator, CuratorConfig, EventLog};
pub use lock::{clean_stale_locks, find_all_locks, IdentityLock, LockError, LockInfo};
pub use molecule::{
    instantiate_children, instantiate_markdown, parse_markdown, Molecule, MoleculeError,
};
pub use polecats::{AddOptions, Manager, ManagerError};
pub use reaper::{Reaper, ReaperConfig};
pub use refinery::{
    MergeOutcome, OnConflict, PassOutcome, Refinery, RefineryConfig, RefineryError, ScoreParams,
};
pub use slot::MergeSlot;
pub use town::{RigConfig, TownPaths};
pub use witness::{classify_help, HelpAction, Witness, WitnessConfig, WitnessError};
