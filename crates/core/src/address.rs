// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailbox address grammar: `[machine:]rig[/target]`.
//!
//! Targets within a rig are the empty broadcast, a role singleton
//! (`witness`, `refinery`, `deacon`), an unqualified worker name (routed
//! by the mail router, which tries `crew/<name>` then `polecats/<name>`),
//! or an explicit `crew/<name>` / `polecats/<name>` path. The two
//! town-level addresses are `mayor` and `deacon`; a trailing slash is
//! tolerated on input and dropped on display.

use crate::polecat::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role singletons addressable within a rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Witness,
    Refinery,
    Deacon,
}

impl Role {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "witness" => Some(Role::Witness),
            "refinery" => Some(Role::Refinery),
            "deacon" => Some(Role::Deacon),
            _ => None,
        }
    }
}

crate::simple_display! {
    Role {
        Witness => "witness",
        Refinery => "refinery",
        Deacon => "deacon",
    }
}

/// The addressed endpoint within (or above) a rig.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Whole-rig broadcast (`gt` or `gt/`).
    Broadcast,
    /// Role singleton (`gt/witness`).
    Role(Role),
    /// Unqualified worker (`gt/toast`); the router resolves crew vs
    /// polecats at send time.
    Worker(String),
    /// Explicit crew member (`gt/crew/toast`).
    Crew(String),
    /// Explicit polecat (`gt/polecats/toast`).
    Polecat(String),
}

/// A parsed mailbox address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// Town coordinator (`mayor`).
    Mayor,
    /// Town-level deacon (`deacon`).
    Deacon,
    /// A rig-scoped endpoint.
    Rig {
        machine: Option<String>,
        rig: String,
        target: Target,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("invalid address segment {0:?}")]
    InvalidSegment(String),
    #[error("group {0:?} requires a worker name")]
    MissingWorker(String),
    #[error("too many path segments in {0:?}")]
    TooDeep(String),
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

impl Address {
    /// Parse `[machine:]rig[/target]`.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AddressError::Empty);
        }

        let (machine, rest) = match input.split_once(':') {
            Some((m, rest)) => {
                if !valid_segment(m) {
                    return Err(AddressError::InvalidSegment(m.to_string()));
                }
                (Some(m.to_string()), rest)
            }
            None => (None, input),
        };

        // Trailing slash optional everywhere
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        // Town-level addresses have no machine qualifier and no rig
        if machine.is_none() {
            match rest {
                "mayor" => return Ok(Address::Mayor),
                "deacon" => return Ok(Address::Deacon),
                _ => {}
            }
        }

        let mut parts = rest.splitn(3, '/');
        let rig = parts.next().unwrap_or_default();
        if !valid_segment(rig) {
            return Err(AddressError::InvalidSegment(rig.to_string()));
        }

        let target = match (parts.next(), parts.next()) {
            (None, _) => Target::Broadcast,
            (Some(group @ ("crew" | "polecats")), None) => {
                return Err(AddressError::MissingWorker(group.to_string()));
            }
            (Some(seg), None) => {
                if !valid_segment(seg) {
                    return Err(AddressError::InvalidSegment(seg.to_string()));
                }
                match Role::parse(seg) {
                    Some(role) => Target::Role(role),
                    None => Target::Worker(seg.to_string()),
                }
            }
            (Some("crew"), Some(name)) => {
                if !valid_segment(name) {
                    return Err(AddressError::InvalidSegment(name.to_string()));
                }
                Target::Crew(name.to_string())
            }
            (Some("polecats"), Some(name)) => {
                if !valid_segment(name) {
                    return Err(AddressError::InvalidSegment(name.to_string()));
                }
                Target::Polecat(name.to_string())
            }
            (Some(_), Some(_)) => return Err(AddressError::TooDeep(rest.to_string())),
        };

        Ok(Address::Rig {
            machine,
            rig: rig.to_string(),
            target,
        })
    }

    /// The rig this address lives in, if rig-scoped.
    pub fn rig(&self) -> Option<&str> {
        match self {
            Address::Rig { rig, .. } => Some(rig),
            _ => None,
        }
    }

    /// Deterministic session name for the addressed endpoint.
    ///
    /// Pure: depends only on the address. The machine qualifier is
    /// dropped; sessions are per-host.
    pub fn session_id(&self) -> SessionId {
        let name = match self {
            Address::Mayor => "gt-mayor".to_string(),
            Address::Deacon => "gt-deacon".to_string(),
            Address::Rig { rig, target, .. } => match target {
                Target::Broadcast => format!("gt-{rig}"),
                Target::Role(role) => format!("gt-{rig}-{role}"),
                Target::Crew(name) => format!("gt-{rig}-crew-{name}"),
                Target::Worker(name) | Target::Polecat(name) => format!("gt-{rig}-{name}"),
            },
        };
        SessionId::new(name)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Mayor => f.write_str("mayor"),
            Address::Deacon => f.write_str("deacon"),
            Address::Rig {
                machine,
                rig,
                target,
            } => {
                if let Some(m) = machine {
                    write!(f, "{m}:")?;
                }
                f.write_str(rig)?;
                match target {
                    Target::Broadcast => Ok(()),
                    Target::Role(role) => write!(f, "/{role}"),
                    Target::Worker(name) => write!(f, "/{name}"),
                    Target::Crew(name) => write!(f, "/crew/{name}"),
                    Target::Polecat(name) => write!(f, "/polecats/{name}"),
                }
            }
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

#[cfg(test)]
#[path = "address_tests.rs"]
mod tests;
