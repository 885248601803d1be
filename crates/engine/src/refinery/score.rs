// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge-request scoring.
//!
//! Scores are computed per candidate at every poll; nothing is stored.
//! The default weights guarantee that any P0 outranks any P4 regardless
//! of age, that old convoys eventually preempt newer work, and that the
//! retry penalty caps so repeatedly failing requests cannot starve
//! forever.

use chrono::{DateTime, Utc};
use gt_core::issue::WorkItem;
use gt_core::merge_request::MergeRequestFields;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreParams {
    pub base: f64,
    pub convoy_age_weight: f64,
    pub priority_weight: f64,
    pub retry_penalty: f64,
    pub max_retry_penalty: f64,
    pub mr_age_weight: f64,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            base: 1000.0,
            convoy_age_weight: 10.0,
            priority_weight: 100.0,
            retry_penalty: 50.0,
            max_retry_penalty: 300.0,
            mr_age_weight: 1.0,
        }
    }
}

fn hours_since(timestamp: Option<&str>, now: DateTime<Utc>) -> f64 {
    let Some(ts) = timestamp else { return 0.0 };
    let Ok(then) = DateTime::parse_from_rfc3339(ts) else {
        return 0.0;
    };
    let hours = (now - then.with_timezone(&Utc)).num_seconds() as f64 / 3600.0;
    hours.max(0.0)
}

impl ScoreParams {
    /// Higher = merged sooner.
    pub fn score(&self, item: &WorkItem, fields: &MergeRequestFields, now: DateTime<Utc>) -> f64 {
        let priority_term = f64::from(4u8.saturating_sub(item.priority.0).min(4));
        let convoy_term = if fields.convoy_id.is_some() {
            hours_since(fields.convoy_created_at.as_deref(), now)
        } else {
            0.0
        };
        let retry_term =
            (self.retry_penalty * f64::from(fields.retry_count)).min(self.max_retry_penalty);

        self.base
            + self.convoy_age_weight * convoy_term
            + self.priority_weight * priority_term
            - retry_term
            + self.mr_age_weight * hours_since(item.created_at.as_deref(), now)
    }
}

#[cfg(test)]
#[path = "score_tests.rs"]
mod tests;
