// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Markdown molecule parser.
//!
//! Line-oriented and case-insensitive:
//!
//! ```text
//! ## Step: <ref>
//! <prose>
//! Needs: <ref>, <ref>
//! Tier: haiku|sonnet|opus
//! Type: task|wait
//! WaitsFor: all-children, ...
//! Backoff: base=30s, multiplier=2, max=10m
//! ```

use super::{Backoff, Molecule, StepSpec, StepType, Tier};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

/// Regex pattern for {{variable_name}} step-prose placeholders
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_-]*)\s*\}\}")
        .expect("constant regex pattern is valid")
});

/// Expand `{{name}}` placeholders with values from the vars map.
///
/// Unknown variables are left as-is.
pub fn expand_vars(text: &str, vars: &HashMap<String, String>) -> String {
    VAR_PATTERN
        .replace_all(text, |caps: &regex::Captures| {
            match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                // Unknown variable: keep the placeholder verbatim
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Parse `30s` / `10m` / `2h` / bare seconds.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => s.split_at(split),
        None => (s, ""),
    };
    let value: u64 = digits.parse().ok()?;
    let secs = match unit.trim() {
        "" | "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

/// `base=30s, multiplier=2, max=10m`
fn parse_backoff(s: &str) -> Option<Backoff> {
    let mut base = None;
    let mut multiplier = None;
    let mut max = None;
    for part in s.split(',') {
        let (key, value) = part.split_once('=')?;
        match key.trim().to_ascii_lowercase().as_str() {
            "base" => base = parse_duration(value),
            "multiplier" => multiplier = value.trim().parse().ok(),
            "max" => max = parse_duration(value),
            _ => {}
        }
    }
    Some(Backoff {
        base: base?,
        multiplier: multiplier?,
        max: max?,
    })
}

/// Case-insensitive `Key:` prefix match; returns the value.
fn keyed<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = line.split_once(':')?;
    k.trim().eq_ignore_ascii_case(key).then(|| v.trim())
}

/// Parse the markdown form out of a description. Lines before the
/// first step header are ignored (they are the molecule's own prose).
pub fn parse_markdown(description: &str) -> Molecule {
    let mut steps: Vec<StepSpec> = Vec::new();
    let mut current: Option<StepSpec> = None;

    for line in description.lines() {
        let trimmed = line.trim();

        // "## Step: <ref>" (case-insensitive)
        let header = trimmed
            .strip_prefix("##")
            .map(str::trim)
            .and_then(|rest| keyed(rest, "step"));
        if let Some(step_ref) = header {
            if let Some(done) = current.take() {
                steps.push(done);
            }
            current = Some(StepSpec {
                step_ref: step_ref.to_string(),
                ..Default::default()
            });
            continue;
        }

        let Some(step) = current.as_mut() else {
            continue;
        };

        if let Some(needs) = keyed(trimmed, "needs") {
            step.needs.extend(
                needs
                    .split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
            );
        } else if let Some(tier) = keyed(trimmed, "tier") {
            step.tier = Tier::parse(tier);
        } else if let Some(step_type) = keyed(trimmed, "type") {
            step.step_type = StepType::parse(step_type).unwrap_or_default();
        } else if let Some(waits) = keyed(trimmed, "waitsfor") {
            step.waits_for = Some(waits.to_string());
        } else if let Some(backoff) = keyed(trimmed, "backoff") {
            step.backoff = parse_backoff(backoff);
        } else if !trimmed.is_empty() {
            if !step.prose.is_empty() {
                step.prose.push('\n');
            }
            step.prose.push_str(trimmed);
        }
    }
    if let Some(done) = current.take() {
        steps.push(done);
    }
    Molecule { steps }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
