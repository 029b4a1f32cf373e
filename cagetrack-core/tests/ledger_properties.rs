//! Behavioural properties of the ledger, registry and derived views,
//! exercised through `TrackerState`.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rstest::rstest;

use cagetrack_core::{
    CageName, DateRange, DuplicatePolicy, LedgerError, OrderId, OrderLedger, OrderStatus,
    ResetScope, TrackerState, CageRegistry,
};

fn state() -> TrackerState {
    TrackerState::default()
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32, ms: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).single().expect("valid")
        + chrono::Duration::milliseconds(i64::from(ms))
}

// ---------------------------------------------------------------------------
// 1. Add / dedup
// ---------------------------------------------------------------------------

#[rstest]
#[case("ORD-100", Some("A-01"))]
#[case("  padded  ", Some("C-02"))]
#[case("unassigned", None)]
fn add_then_read_has_exactly_one_in_cage_record(#[case] id: &str, #[case] cage: Option<&str>) {
    let mut state = state();
    state.add_order(id, cage.map(CageName::from)).expect("add");

    let matching: Vec<_> = state
        .records()
        .iter()
        .filter(|r| r.id.as_str() == id.trim())
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].status, OrderStatus::InCage);
}

#[test]
fn duplicate_while_in_cage_then_readd_after_retire() {
    let mut state = state();
    state.add_order("ORD-1", Some("A-01".into())).expect("first add");

    let err = state.add_order("ORD-1", Some("A-02".into())).unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateOrder { .. }), "got {err:?}");

    state.retire_cage("A-01").expect("retire");
    state
        .add_order("ORD-1", Some("A-02".into()))
        .expect("re-add after retire succeeds under the in-cage policy");

    let ids: Vec<_> = state
        .records()
        .iter()
        .filter(|r| r.id.as_str() == "ORD-1")
        .map(|r| r.status)
        .collect();
    assert_eq!(ids, [OrderStatus::InCage, OrderStatus::Completed]);
}

#[test]
fn all_statuses_policy_keeps_completed_ids_blocked() {
    let mut state = TrackerState::new(
        CageRegistry::default(),
        OrderLedger::new(DuplicatePolicy::AllStatuses),
    );
    state.add_order("ORD-1", Some("A-01".into())).expect("add");
    state.retire_cage("A-01").expect("retire");
    assert!(matches!(
        state.add_order("ORD-1", Some("A-01".into())),
        Err(LedgerError::DuplicateOrder { .. })
    ));
}

// ---------------------------------------------------------------------------
// 2. Counts and retire
// ---------------------------------------------------------------------------

#[rstest]
#[case(1)]
#[case(4)]
#[case(12)]
fn counts_track_adds_and_retire(#[case] n: usize) {
    let mut state = state();
    for i in 0..n {
        state
            .add_order(&format!("ORD-{i}"), Some("A-05".into()))
            .expect("add");
    }
    assert_eq!(state.counts_by_cage().get("A-05"), Some(n));

    assert_eq!(state.retire_cage("A-05"), Ok(n));
    assert_eq!(state.counts_by_cage().get("A-05"), Some(0));
    assert_eq!(state.records().len(), n);
    assert!(state.records().iter().all(|r| r.status == OrderStatus::Completed));

    assert_eq!(
        state.retire_cage("A-05"),
        Err(LedgerError::NothingToReset {
            scope: ResetScope::Cage(CageName::from("A-05"))
        })
    );
}

// ---------------------------------------------------------------------------
// 3. Rename cascade
// ---------------------------------------------------------------------------

#[test]
fn rename_carries_counts_and_leaves_no_old_references() {
    let mut state = state();
    for i in 0..3 {
        state
            .add_order(&format!("ORD-{i}"), Some("A-01".into()))
            .expect("add");
    }
    state.retire_cage("A-01").expect("retire");
    state.add_order("ORD-9", Some("A-01".into())).expect("add");
    let before = state.counts_by_cage().get("A-01");

    state.rename_cage("A-01", "Z-09").expect("rename");

    assert_eq!(state.counts_by_cage().get("Z-09"), before);
    assert_eq!(state.counts_by_cage().get("A-01"), None);
    assert!(state.records().iter().all(|r| !r.cage_is("A-01")));
    assert_eq!(state.registry().position("Z-09"), Some(0));
}

// ---------------------------------------------------------------------------
// 4. Date filter
// ---------------------------------------------------------------------------

#[test]
fn single_day_filter_includes_both_endpoints() {
    let mut state = state();
    let cage = Some(CageName::from("A-01"));
    for (id, at) in [
        ("before", utc(2024, 1, 1, 23, 59, 59, 999)),
        ("open", utc(2024, 1, 2, 0, 0, 0, 0)),
        ("noon", utc(2024, 1, 2, 12, 0, 0, 0)),
        ("close", utc(2024, 1, 2, 23, 59, 59, 999)),
        ("after", utc(2024, 1, 3, 0, 0, 0, 0)),
    ] {
        state.add_order_at(id, cage.clone(), at).expect("add");
    }

    let day = NaiveDate::from_ymd_opt(2024, 1, 2).expect("date");
    let ids: Vec<&str> = state
        .filter_in(DateRange::new(Some(day), Some(day)), &Utc)
        .into_iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(ids, ["close", "noon", "open"]);
}

// ---------------------------------------------------------------------------
// 5. Bulk, delete, reset
// ---------------------------------------------------------------------------

#[test]
fn bulk_inserts_exact_count_with_distinct_ids() {
    let mut state = state();
    state.add_order("scanned", Some("B-01".into())).expect("add");
    let batch = state.generate_bulk(&CageName::from("B-01"), 5).expect("bulk");

    assert_eq!(batch.len(), 5);
    assert_eq!(state.records().len(), 6);
    let mut ids: Vec<&OrderId> = batch.iter().map(|r| &r.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
    assert!(batch.iter().all(|r| r.cage_is("B-01") && r.status == OrderStatus::InCage));
    assert_eq!(state.counts_by_cage().get("B-01"), Some(6));
}

#[rstest]
#[case(0)]
#[case(-1)]
#[case(10_001)]
#[case(i64::MAX)]
fn bulk_rejects_counts_outside_limits(#[case] count: i64) {
    let mut state = state();
    assert_eq!(
        state.generate_bulk(&CageName::from("B-01"), count),
        Err(LedgerError::InvalidCount { count })
    );
    assert!(state.records().is_empty());
}

#[test]
fn deleting_missing_pair_is_not_found_and_changes_nothing() {
    let mut state = state();
    let kept = state.add_order("ORD-1", Some("A-01".into())).expect("add");
    let before = state.records().to_vec();

    let err = state
        .delete_order(&OrderId::from("ORD-1"), &utc(2000, 1, 1, 0, 0, 0, 0))
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
    assert_eq!(state.records(), before.as_slice());

    state.delete_order(&kept.id, &kept.created_at).expect("delete");
    assert!(state.records().is_empty());
}

#[test]
fn reset_all_is_one_shot() {
    let mut state = state();
    assert!(matches!(
        state.reset_all(),
        Err(LedgerError::NothingToReset { scope: ResetScope::Ledger })
    ));
    state.add_order("a", None).expect("add");
    assert_eq!(state.reset_all(), Ok(1));
}

// ---------------------------------------------------------------------------
// 6. Registry reset
// ---------------------------------------------------------------------------

#[test]
fn registry_reset_orphans_but_keeps_records() {
    let mut state = state();
    state.add_cage("Overflow").expect("add cage");
    state.add_order("kept", Some("Overflow".into())).expect("add");

    state.reset_cages_to_default();

    assert!(!state.is_valid_cage("Overflow"));
    assert_eq!(state.orphaned_cages(), vec![CageName::from("Overflow")]);
    assert_eq!(state.records().len(), 1);
    assert!(state.records()[0].cage_is("Overflow"));
    assert_eq!(state.resolve_selection(Some("Overflow")), Some(CageName::from("A-01")));
}
