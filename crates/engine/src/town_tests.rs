// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn layout_paths() {
    let town = TownPaths::new("/town");
    assert_eq!(
        town.agent_lock("gt", "toast"),
        Path::new("/town/gt/polecats/toast/.runtime/agent.lock")
    );
    assert_eq!(town.mayor_rig("gt"), Path::new("/town/gt/mayor/rig"));
    assert_eq!(
        town.rig_config("gt"),
        Path::new("/town/.beads-wisp/config/gt.json")
    );
    assert_eq!(town.events_log(), Path::new("/town/.events.jsonl"));
}

#[test]
fn refinery_checkout_falls_back_to_mayor() {
    let tmp = tempfile::tempdir().unwrap();
    let town = TownPaths::new(tmp.path());
    assert_eq!(town.refinery_checkout("gt"), town.mayor_rig("gt"));

    std::fs::create_dir_all(town.refinery_rig("gt")).unwrap();
    assert_eq!(town.refinery_checkout("gt"), town.refinery_rig("gt"));
}

#[test]
fn rig_config_defaults_when_missing_and_parses_overrides() {
    let tmp = tempfile::tempdir().unwrap();
    let town = TownPaths::new(tmp.path());

    let config = RigConfig::load(&town, "gt").unwrap();
    assert_eq!(config.refinery.poll_interval_secs, 30);
    assert!(config.branch_template.is_none());

    let path = town.rig_config("gt");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{
            "branch_template": "work/{name}-{timestamp}",
            "refinery": {"run_tests": true, "poll_interval_secs": 5}
        }"#,
    )
    .unwrap();
    let config = RigConfig::load(&town, "gt").unwrap();
    assert_eq!(
        config.branch_template.as_deref(),
        Some("work/{name}-{timestamp}")
    );
    assert!(config.refinery.run_tests);
    assert_eq!(config.refinery.poll_interval_secs, 5);
}

#[test]
fn town_root_marker() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(!TownPaths::is_town_root(tmp.path()));
    let town = TownPaths::new(tmp.path());
    std::fs::create_dir_all(town.town_marker().parent().unwrap()).unwrap();
    std::fs::write(town.town_marker(), "{}").unwrap();
    assert!(TownPaths::is_town_root(tmp.path()));
}
