// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw event records (one JSON object per line in `.events.jsonl`).
//!
//! The core only appends; the feed curator reads the raw log, filters by
//! visibility, and folds bursts into the user-facing `.feed.jsonl`.

use serde::{Deserialize, Serialize};

/// Where a record is allowed to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Audit trail only.
    Audit,
    /// User-facing feed only.
    Feed,
    /// Both streams.
    Both,
}

impl Visibility {
    pub fn feed_visible(&self) -> bool {
        matches!(self, Visibility::Feed | Visibility::Both)
    }
}

crate::simple_display! {
    Visibility {
        Audit => "audit",
        Feed => "feed",
        Both => "both",
    }
}

/// One event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// RFC3339 UTC.
    pub ts: String,
    /// Always `"gt"` for records written by this process.
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
    pub visibility: Visibility,
}

impl EventRecord {
    pub fn new(
        ts: impl Into<String>,
        event_type: impl Into<String>,
        actor: impl Into<String>,
        payload: serde_json::Value,
        visibility: Visibility,
    ) -> Self {
        Self {
            ts: ts.into(),
            source: "gt".to_string(),
            event_type: event_type.into(),
            actor: actor.into(),
            payload,
            visibility,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
