// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Namespaced channel configuration (`<town>/config/messaging.json`).
//!
//! Three channel kinds share the bus: `list:` (static fan-out),
//! `queue:` (ordered recipients, bounded claims, one winner per send),
//! and `announce:` (pub/sub with a retain count).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListChannel {
    pub recipients: Vec<String>,
}

fn default_max_claims() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueChannel {
    /// Ordered: earlier recipients win ties.
    pub recipients: Vec<String>,
    /// Maximum unacknowledged messages one recipient may hold.
    #[serde(default = "default_max_claims")]
    pub max_claims: usize,
}

fn default_retain() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceChannel {
    pub subscribers: Vec<String>,
    /// How many past announcements the channel mailbox retains.
    #[serde(default = "default_retain")]
    pub retain: usize,
}

/// The whole messaging config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default)]
    pub lists: BTreeMap<String, ListChannel>,
    #[serde(default)]
    pub queues: BTreeMap<String, QueueChannel>,
    #[serde(default)]
    pub announces: BTreeMap<String, AnnounceChannel>,
}

impl MessagingConfig {
    /// Load from `<town>/config/messaging.json`. A missing file is an
    /// empty config, not an error.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[path = "channels_tests.rs"]
mod tests;
