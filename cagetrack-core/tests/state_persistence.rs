//! Snapshot and config persistence under a temporary home directory.

use assert_fs::prelude::*;
use chrono::{TimeZone, Utc};
use predicates::prelude::predicate;
use std::fs;

use cagetrack_core::{
    config::load_config_at,
    storage::{load_state_at, open_state_at, save_state_at, state_path_at},
    BackendConfig, CageName, DuplicatePolicy, OrderStatus, PersistError, TrackerConfig,
};

#[test]
fn state_survives_save_and_open() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = TrackerConfig::default();

    let mut state = open_state_at(home.path(), &config).expect("open fresh");
    state.add_cage("Overflow").expect("add cage");
    state.rename_cage("A-02", "A-02b").expect("rename");
    let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).single().expect("ts");
    state.add_order_at("ORD-1", Some("Overflow".into()), at).expect("add");
    state.add_order("ORD-2", Some("A-02b".into())).expect("add");
    state.retire_cage("A-02b").expect("retire");
    save_state_at(home.path(), &state.snapshot()).expect("save");

    home.child(".cagetrack/state.yaml")
        .assert(predicate::str::contains("Overflow"));

    let reopened = open_state_at(home.path(), &config).expect("reopen");
    assert_eq!(reopened.registry().cages(), state.registry().cages());
    assert_eq!(reopened.records(), state.records());
    assert_eq!(reopened.records()[0].status, OrderStatus::Completed);
    assert_eq!(reopened.records()[1].created_at, at);
}

#[test]
fn reopened_registry_resets_to_configured_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = TrackerConfig {
        default_cages: Some(vec!["North".into(), "South".into()]),
        ..TrackerConfig::default()
    };

    let mut state = open_state_at(home.path(), &config).expect("open");
    assert_eq!(state.registry().len(), 2);
    state.add_cage("East").expect("add");
    save_state_at(home.path(), &state.snapshot()).expect("save");

    let mut reopened = open_state_at(home.path(), &config).expect("reopen");
    assert!(reopened.is_valid_cage("East"));
    reopened.reset_cages_to_default();
    assert_eq!(
        reopened.registry().cages(),
        &[CageName::from("North"), CageName::from("South")]
    );
}

#[test]
fn corrupt_state_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = state_path_at(home.path());
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, b": : corrupt : yaml : !!!\n  - broken: [unclosed").expect("write");

    let err = load_state_at(home.path()).unwrap_err();
    assert!(matches!(err, PersistError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("state.yaml"));
}

#[test]
fn config_file_is_read_from_home() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".cagetrack").create_dir_all().expect("mkdir");
    home.child(".cagetrack/config.yaml")
        .write_str(
            "duplicate_policy: all_statuses\nbackend:\n  kind: shared\n  collection: site-2/orders\n",
        )
        .expect("write config");

    let config = load_config_at(home.path()).expect("load");
    assert_eq!(config.duplicate_policy, DuplicatePolicy::AllStatuses);
    assert!(matches!(config.backend, BackendConfig::Shared { .. }));
    let (_, collection) = config.shared_store_at(home.path()).expect("shared");
    assert_eq!(collection, "site-2/orders");

    let state = open_state_at(home.path(), &config).expect("open");
    assert_eq!(state.ledger().policy(), DuplicatePolicy::AllStatuses);
}
