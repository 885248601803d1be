// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const DESC: &str = "Fix the flaky auth test.\n\
                    Branch: polecat/toast/gt-abc@1700\n\
                    Retry-Count: 2\n\
                    \n\
                    See also: the tracker item.";

#[test]
fn get_field_is_case_insensitive() {
    assert_eq!(get_field(DESC, "branch"), Some("polecat/toast/gt-abc@1700"));
    assert_eq!(get_field(DESC, "RETRY-COUNT"), Some("2"));
    assert_eq!(get_field(DESC, "Missing"), None);
}

#[test]
fn set_field_replaces_in_place() {
    let updated = set_field(DESC, "Retry-Count", "3");
    assert_eq!(get_field(&updated, "Retry-Count"), Some("3"));
    // Prose and other fields untouched
    assert!(updated.starts_with("Fix the flaky auth test."));
    assert_eq!(
        get_field(&updated, "Branch"),
        Some("polecat/toast/gt-abc@1700")
    );
}

#[test]
fn set_field_appends_when_absent() {
    let updated = set_field(DESC, "Merge-Commit", "abc1234");
    assert!(updated.ends_with("Merge-Commit: abc1234"));
}

#[test]
fn parse_fields_skips_prose_colons() {
    let fields = parse_fields(DESC);
    let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
    // "See also" contains a space, so it is prose, not a field
    assert_eq!(keys, vec!["Branch", "Retry-Count"]);
}

#[yare::parameterized(
    empty       = { "", "K", "v", "K: v" },
    only_field  = { "K: old", "K", "new", "K: new" },
)]
fn set_field_edge_cases(desc: &str, key: &str, value: &str, expected: &str) {
    assert_eq!(set_field(desc, key, value), expected);
}
