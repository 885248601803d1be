// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Molecules: DAG templates that instantiate child work items.
//!
//! Two encodings share one validation and instantiation path: a
//! child-issue form (the molecule item's children are the steps, with
//! `depends-on` edges for ordering) and a markdown form embedded in the
//! description.

mod instantiate;
mod parser;

pub use instantiate::{instantiate_children, instantiate_markdown, InstantiateError};
pub use parser::{expand_vars, parse_markdown};

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

/// Model tier hint for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Haiku,
    Sonnet,
    Opus,
}

impl Tier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haiku" => Some(Tier::Haiku),
            "sonnet" => Some(Tier::Sonnet),
            "opus" => Some(Tier::Opus),
            _ => None,
        }
    }
}

gt_core::simple_display! {
    Tier {
        Haiku => "haiku",
        Sonnet => "sonnet",
        Opus => "opus",
    }
}

/// Step execution kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepType {
    #[default]
    Task,
    Wait,
}

impl StepType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" => Some(StepType::Task),
            "wait" => Some(StepType::Wait),
            _ => None,
        }
    }
}

gt_core::simple_display! {
    StepType {
        Task => "task",
        Wait => "wait",
    }
}

/// Retry backoff for wait steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub multiplier: u32,
    pub max: Duration,
}

/// One step of a molecule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepSpec {
    pub step_ref: String,
    pub prose: String,
    pub needs: Vec<String>,
    pub tier: Option<Tier>,
    pub step_type: StepType,
    pub waits_for: Option<String>,
    pub backoff: Option<Backoff>,
}

/// A parsed molecule template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Molecule {
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoleculeError {
    #[error("step {index} has an empty ref")]
    EmptyRef { index: usize },
    #[error("duplicate step ref {0:?}")]
    DuplicateRef(String),
    #[error("step {step:?} needs unknown step {needs:?}")]
    UnknownNeed { step: String, needs: String },
    #[error("step {0:?} depends on itself")]
    SelfDependency(String),
    #[error("dependency cycle through {0:?}")]
    Cycle(String),
}

impl Molecule {
    /// Validation rules: every step has a non-empty unique ref, every
    /// Needs reference exists, no self-dependency, no cycles.
    pub fn validate(&self) -> Result<(), MoleculeError> {
        let mut refs = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.step_ref.trim().is_empty() {
                return Err(MoleculeError::EmptyRef { index });
            }
            if !refs.insert(step.step_ref.as_str()) {
                return Err(MoleculeError::DuplicateRef(step.step_ref.clone()));
            }
        }
        for step in &self.steps {
            for need in &step.needs {
                if need == &step.step_ref {
                    return Err(MoleculeError::SelfDependency(step.step_ref.clone()));
                }
                if !refs.contains(need.as_str()) {
                    return Err(MoleculeError::UnknownNeed {
                        step: step.step_ref.clone(),
                        needs: need.clone(),
                    });
                }
            }
        }
        self.check_cycles()
    }

    /// Depth-first search with a visiting-in-progress marker.
    fn check_cycles(&self) -> Result<(), MoleculeError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        let index: HashMap<&str, &StepSpec> = self
            .steps
            .iter()
            .map(|s| (s.step_ref.as_str(), s))
            .collect();
        let mut marks: HashMap<&str, Mark> = self
            .steps
            .iter()
            .map(|s| (s.step_ref.as_str(), Mark::Unvisited))
            .collect();

        fn visit<'a>(
            node: &'a str,
            index: &HashMap<&'a str, &'a StepSpec>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<(), MoleculeError> {
            match marks.get(node).copied().unwrap_or(Mark::Done) {
                Mark::Done => return Ok(()),
                Mark::Visiting => return Err(MoleculeError::Cycle(node.to_string())),
                Mark::Unvisited => {}
            }
            marks.insert(node, Mark::Visiting);
            if let Some(step) = index.get(node) {
                for need in &step.needs {
                    visit(need, index, marks)?;
                }
            }
            marks.insert(node, Mark::Done);
            Ok(())
        }

        for step in &self.steps {
            visit(step.step_ref.as_str(), &index, &mut marks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
