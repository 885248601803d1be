// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Molecule instantiation.
//!
//! Best-effort atomic: when any per-step creation fails, every child
//! created so far is closed to compensate, so a half-instantiated
//! molecule never sits in the ready queue.

use super::parser::expand_vars;
use super::{Molecule, MoleculeError};
use gt_adapters::tracker::{
    CreateRequest, DepDirection, ListFilter, TrackerAdapter, TrackerError,
};
use gt_core::issue::{BeadId, IssueType};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum InstantiateError {
    #[error(transparent)]
    Invalid(#[from] MoleculeError),
    #[error("tracker error instantiating step {step:?}: {source}")]
    Step {
        step: String,
        #[source]
        source: TrackerError,
    },
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("molecule {0} has no child steps")]
    NoChildren(BeadId),
}

/// Close already-created children after a failure.
async fn compensate(tracker: &dyn TrackerAdapter, created: &[BeadId]) {
    for id in created {
        if let Err(err) = tracker.close(id, Some("molecule instantiation failed")).await {
            warn!(child = %id, error = %err, "compensation close failed");
        }
    }
}

/// Instantiate the markdown form: one child item per step under
/// `parent`, with `depends-on` edges wired from `Needs`. Template
/// variables in step prose are expanded from `vars`.
pub async fn instantiate_markdown(
    tracker: Arc<dyn TrackerAdapter>,
    molecule: &Molecule,
    parent: &BeadId,
    vars: &HashMap<String, String>,
) -> Result<Vec<BeadId>, InstantiateError> {
    molecule.validate()?;

    let mut created: Vec<BeadId> = Vec::new();
    let mut by_ref: HashMap<&str, BeadId> = HashMap::new();

    for step in &molecule.steps {
        let mut description = expand_vars(&step.prose, vars);
        if let Some(tier) = step.tier {
            description = gt_core::fields::set_field(&description, "Tier", &tier.to_string());
        }
        description =
            gt_core::fields::set_field(&description, "Type", &step.step_type.to_string());
        if let Some(waits) = &step.waits_for {
            description = gt_core::fields::set_field(&description, "WaitsFor", waits);
        }
        if let Some(backoff) = step.backoff {
            description = gt_core::fields::set_field(
                &description,
                "Backoff",
                &format!(
                    "base={}s, multiplier={}, max={}s",
                    backoff.base.as_secs(),
                    backoff.multiplier,
                    backoff.max.as_secs()
                ),
            );
        }

        let result = tracker
            .create(CreateRequest {
                title: step.step_ref.clone(),
                issue_type: Some(IssueType::Task),
                description: Some(description),
                parent: Some(parent.clone()),
                ..Default::default()
            })
            .await;
        match result {
            Ok(id) => {
                by_ref.insert(step.step_ref.as_str(), id.clone());
                created.push(id);
            }
            Err(source) => {
                compensate(tracker.as_ref(), &created).await;
                return Err(InstantiateError::Step {
                    step: step.step_ref.clone(),
                    source,
                });
            }
        }
    }

    // Wire ordering edges; refs were validated so lookups cannot miss
    for step in &molecule.steps {
        let Some(child) = by_ref.get(step.step_ref.as_str()) else {
            continue;
        };
        for need in &step.needs {
            let Some(needed) = by_ref.get(need.as_str()) else {
                continue;
            };
            if let Err(source) = tracker.dep_add(child, needed, None).await {
                compensate(tracker.as_ref(), &created).await;
                return Err(InstantiateError::Step {
                    step: step.step_ref.clone(),
                    source,
                });
            }
        }
    }

    info!(parent = %parent, steps = created.len(), "molecule instantiated");
    Ok(created)
}

/// Instantiate the child-issue form: copy the molecule item's children
/// under `new_parent` and replicate the intra-set dependency edges.
pub async fn instantiate_children(
    tracker: Arc<dyn TrackerAdapter>,
    molecule_id: &BeadId,
    new_parent: &BeadId,
) -> Result<Vec<BeadId>, InstantiateError> {
    let originals = tracker
        .list(ListFilter {
            parent: Some(molecule_id.clone()),
            ..Default::default()
        })
        .await?;
    if originals.is_empty() {
        return Err(InstantiateError::NoChildren(molecule_id.clone()));
    }

    let mut created = Vec::new();
    let mut copy_of: HashMap<String, BeadId> = HashMap::new();

    for original in &originals {
        let result = tracker
            .create(CreateRequest {
                title: original.title.clone(),
                issue_type: Some(original.issue_type),
                priority: Some(original.priority),
                description: Some(original.description.clone()),
                parent: Some(new_parent.clone()),
                labels: original.labels.iter().cloned().collect(),
                ..Default::default()
            })
            .await;
        match result {
            Ok(id) => {
                copy_of.insert(original.id.to_string(), id.clone());
                created.push(id);
            }
            Err(source) => {
                compensate(tracker.as_ref(), &created).await;
                return Err(InstantiateError::Step {
                    step: original.id.to_string(),
                    source,
                });
            }
        }
    }

    // Replicate only edges whose both ends are inside the copied set
    for original in &originals {
        let deps = tracker
            .dep_list(&original.id, DepDirection::Down, Some("blocks"))
            .await?;
        let Some(from_copy) = copy_of.get(original.id.as_str()) else {
            continue;
        };
        for dep in deps {
            if let Some(to_copy) = copy_of.get(dep.id.as_str()) {
                if let Err(source) = tracker.dep_add(from_copy, to_copy, None).await {
                    compensate(tracker.as_ref(), &created).await;
                    return Err(InstantiateError::Step {
                        step: original.id.to_string(),
                        source,
                    });
                }
            }
        }
    }

    Ok(created)
}

#[cfg(test)]
#[path = "instantiate_tests.rs"]
mod tests;
