// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn step(step_ref: &str, needs: &[&str]) -> StepSpec {
    StepSpec {
        step_ref: step_ref.to_string(),
        needs: needs.iter().map(|n| n.to_string()).collect(),
        ..Default::default()
    }
}

#[test]
fn diamond_is_valid() {
    let molecule = Molecule {
        steps: vec![
            step("design", &[]),
            step("implement", &["design"]),
            step("test", &["implement"]),
            step("submit", &["implement", "test"]),
        ],
    };
    molecule.validate().unwrap();
}

#[test]
fn empty_ref_reports_index() {
    let molecule = Molecule {
        steps: vec![step("ok", &[]), step("  ", &[])],
    };
    assert_eq!(
        molecule.validate().unwrap_err(),
        MoleculeError::EmptyRef { index: 1 }
    );
}

#[test]
fn two_node_cycle() {
    let molecule = Molecule {
        steps: vec![step("a", &["b"]), step("b", &["a"])],
    };
    assert!(matches!(
        molecule.validate().unwrap_err(),
        MoleculeError::Cycle(_)
    ));
}

#[test]
fn tier_and_type_parse() {
    assert_eq!(Tier::parse("Opus"), Some(Tier::Opus));
    assert_eq!(Tier::parse("gpt"), None);
    assert_eq!(StepType::parse("WAIT"), Some(StepType::Wait));
    assert_eq!(StepType::parse(""), None);
}
