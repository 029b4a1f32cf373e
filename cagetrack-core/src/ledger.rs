//! Order ledger: the sequence of order records and their transitions.
//!
//! Records are kept sorted by `created_at` descending (most recent first).
//! The sort is stable and new records are placed ahead of existing ones
//! before sorting, so records with equal timestamps stay in reverse
//! insertion order.
//!
//! Records are only ever mutated in two ways: `InCage -> Completed` through
//! [`OrderLedger::retire_cage`], and the `cage` field through
//! [`OrderLedger::rename_cage_cascade`].

use chrono::{DateTime, Utc};

use crate::error::{LedgerError, ResetScope};
use crate::types::{CageName, DuplicatePolicy, OrderId, OrderRecord, OrderStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderLedger {
    records: Vec<OrderRecord>,
    policy: DuplicatePolicy,
}

impl OrderLedger {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            records: Vec::new(),
            policy,
        }
    }

    /// Build a ledger from records in any order.
    pub fn from_records(records: Vec<OrderRecord>, policy: DuplicatePolicy) -> Self {
        let mut ledger = Self { records, policy };
        ledger.sort_newest_first();
        ledger
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &OrderId, created_at: &DateTime<Utc>) -> Option<&OrderRecord> {
        self.records.iter().find(|r| r.matches_key(id, created_at))
    }

    /// The record that would block a new scan of `id` under the ledger's policy.
    pub fn find_blocking(&self, id: &OrderId) -> Option<&OrderRecord> {
        self.records
            .iter()
            .find(|r| r.id == *id && self.policy.blocks(r))
    }

    /// Trim `raw` and check it is non-empty and not blocked by an existing record.
    pub fn validate_new_id(&self, raw: &str) -> Result<OrderId, LedgerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::EmptyId);
        }
        let id = OrderId::from(trimmed);
        if let Some(existing) = self.find_blocking(&id) {
            return Err(LedgerError::DuplicateOrder {
                id,
                cage: existing.cage.clone(),
                created_at: existing.created_at,
                status: existing.status,
            });
        }
        Ok(id)
    }

    /// Scan a new order into `cage`, stamped with the current time.
    pub fn add_order(
        &mut self,
        raw_id: &str,
        cage: Option<CageName>,
    ) -> Result<OrderRecord, LedgerError> {
        self.add_order_at(raw_id, cage, Utc::now())
    }

    /// [`OrderLedger::add_order`] with an explicit creation instant.
    pub fn add_order_at(
        &mut self,
        raw_id: &str,
        cage: Option<CageName>,
        created_at: DateTime<Utc>,
    ) -> Result<OrderRecord, LedgerError> {
        let id = self.validate_new_id(raw_id)?;
        let record = OrderRecord::in_cage(id, cage, created_at);
        self.insert_unchecked(vec![record.clone()]);
        Ok(record)
    }

    /// Insert records without the duplicate-id check (bulk generation).
    ///
    /// The batch lands ahead of existing records in the given order, then the
    /// whole ledger is re-sorted.
    pub fn insert_unchecked(&mut self, batch: Vec<OrderRecord>) {
        if batch.is_empty() {
            return;
        }
        let mut merged = batch;
        merged.append(&mut self.records);
        self.records = merged;
        self.sort_newest_first();
    }

    /// Move every in-cage record of `cage` to `Completed`.
    ///
    /// Returns how many records were retired.
    pub fn retire_cage(&mut self, cage: &str) -> Result<usize, LedgerError> {
        let mut retired = 0usize;
        for record in self.records.iter_mut().filter(|r| r.in_cage_named(cage)) {
            record.status = OrderStatus::Completed;
            retired += 1;
        }
        if retired == 0 {
            return Err(LedgerError::NothingToReset {
                scope: ResetScope::Cage(CageName::from(cage)),
            });
        }
        Ok(retired)
    }

    /// Remove the record with the given compound key.
    pub fn delete_order(
        &mut self,
        id: &OrderId,
        created_at: &DateTime<Utc>,
    ) -> Result<OrderRecord, LedgerError> {
        let Some(index) = self.records.iter().position(|r| r.matches_key(id, created_at)) else {
            return Err(LedgerError::NotFound {
                id: id.clone(),
                created_at: *created_at,
            });
        };
        Ok(self.records.remove(index))
    }

    /// Point every record in `old` at `new`, whatever its status.
    ///
    /// Returns the number of records rewritten.
    pub fn rename_cage_cascade(&mut self, old: &CageName, new: &CageName) -> usize {
        let mut updated = 0usize;
        for record in self.records.iter_mut() {
            if record.cage.as_ref() == Some(old) {
                record.cage = Some(new.clone());
                updated += 1;
            }
        }
        updated
    }

    /// Drop every record. Returns how many were removed.
    pub fn reset_all(&mut self) -> Result<usize, LedgerError> {
        if self.records.is_empty() {
            return Err(LedgerError::NothingToReset {
                scope: ResetScope::Ledger,
            });
        }
        let removed = self.records.len();
        self.records.clear();
        Ok(removed)
    }

    /// Replace the whole ledger with a snapshot and re-sort it.
    pub fn replace_all(&mut self, records: Vec<OrderRecord>) {
        self.records = records;
        self.sort_newest_first();
    }

    fn sort_newest_first(&mut self) {
        self.records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid ts")
    }

    fn cage(name: &str) -> Option<CageName> {
        Some(CageName::from(name))
    }

    #[test]
    fn add_trims_and_sorts_newest_first() {
        let mut ledger = OrderLedger::default();
        ledger.add_order_at("  ORD-1 ", cage("A-01"), t(0)).expect("add 1");
        ledger.add_order_at("ORD-2", cage("A-01"), t(10)).expect("add 2");
        ledger.add_order_at("ORD-0", cage("A-02"), t(-10)).expect("add 0");

        let ids: Vec<&str> = ledger.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["ORD-2", "ORD-1", "ORD-0"]);
    }

    #[test]
    fn equal_timestamps_keep_newest_insert_first() {
        let mut ledger = OrderLedger::default();
        ledger.add_order_at("first", None, t(0)).expect("add");
        ledger.add_order_at("second", None, t(0)).expect("add");
        assert_eq!(ledger.records()[0].id.as_str(), "second");
        assert_eq!(ledger.records()[1].id.as_str(), "first");
    }

    #[test]
    fn empty_id_rejected() {
        let mut ledger = OrderLedger::default();
        assert_eq!(ledger.add_order(" \t", None), Err(LedgerError::EmptyId));
        assert!(ledger.is_empty());
    }

    #[test]
    fn duplicate_reports_blocking_record() {
        let mut ledger = OrderLedger::default();
        ledger.add_order_at("ORD-1", cage("A-03"), t(0)).expect("add");
        let err = ledger.add_order_at("ORD-1", cage("A-04"), t(5)).unwrap_err();
        match err {
            LedgerError::DuplicateOrder { cage, created_at, status, .. } => {
                assert_eq!(cage, Some(CageName::from("A-03")));
                assert_eq!(created_at, t(0));
                assert_eq!(status, OrderStatus::InCage);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn all_statuses_policy_blocks_completed_ids() {
        let mut ledger = OrderLedger::new(DuplicatePolicy::AllStatuses);
        ledger.add_order_at("ORD-1", cage("A-01"), t(0)).expect("add");
        ledger.retire_cage("A-01").expect("retire");
        assert!(matches!(
            ledger.add_order_at("ORD-1", cage("A-01"), t(1)),
            Err(LedgerError::DuplicateOrder { .. })
        ));
    }

    #[test]
    fn retire_only_touches_in_cage_records_of_that_cage() {
        let mut ledger = OrderLedger::default();
        ledger.add_order_at("a", cage("A-01"), t(0)).expect("add");
        ledger.add_order_at("b", cage("A-01"), t(1)).expect("add");
        ledger.add_order_at("c", cage("A-02"), t(2)).expect("add");

        assert_eq!(ledger.retire_cage("A-01"), Ok(2));
        let still_in_cage: Vec<&str> = ledger
            .records()
            .iter()
            .filter(|r| r.status.is_in_cage())
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(still_in_cage, ["c"]);

        assert!(matches!(
            ledger.retire_cage("A-01"),
            Err(LedgerError::NothingToReset { scope: ResetScope::Cage(_) })
        ));
    }

    #[test]
    fn delete_uses_compound_key() {
        let mut ledger = OrderLedger::default();
        let first = ledger.add_order_at("dup", cage("A-01"), t(0)).expect("add");
        ledger.retire_cage("A-01").expect("retire");
        let second = ledger.add_order_at("dup", cage("A-01"), t(30)).expect("re-add");

        let removed = ledger.delete_order(&first.id, &first.created_at).expect("delete");
        assert_eq!(removed.status, OrderStatus::Completed);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.records()[0], second);
    }

    #[test]
    fn delete_missing_leaves_ledger_unchanged() {
        let mut ledger = OrderLedger::default();
        ledger.add_order_at("x", None, t(0)).expect("add");
        let before = ledger.clone();
        let err = ledger
            .delete_order(&OrderId::from("x"), &(t(0) + Duration::milliseconds(1)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
        assert_eq!(ledger, before);
    }

    #[test]
    fn rename_cascade_rewrites_every_status() {
        let mut ledger = OrderLedger::default();
        ledger.add_order_at("a", cage("A-01"), t(0)).expect("add");
        ledger.retire_cage("A-01").expect("retire");
        ledger.add_order_at("b", cage("A-01"), t(1)).expect("add");
        ledger.add_order_at("c", None, t(2)).expect("add");

        let n = ledger.rename_cage_cascade(&CageName::from("A-01"), &CageName::from("Z-09"));
        assert_eq!(n, 2);
        assert!(ledger.records().iter().all(|r| !r.cage_is("A-01")));
        assert_eq!(ledger.records()[2].status, OrderStatus::Completed);
    }

    #[test]
    fn reset_all_then_nothing_to_reset() {
        let mut ledger = OrderLedger::default();
        ledger.add_order("a", None).expect("add");
        assert_eq!(ledger.reset_all(), Ok(1));
        assert_eq!(
            ledger.reset_all(),
            Err(LedgerError::NothingToReset { scope: ResetScope::Ledger })
        );
    }

    #[test]
    fn replace_all_sorts_snapshot() {
        let mut ledger = OrderLedger::default();
        ledger.replace_all(vec![
            OrderRecord::in_cage("old".into(), None, t(0)),
            OrderRecord::in_cage("new".into(), None, t(9)),
        ]);
        assert_eq!(ledger.records()[0].id.as_str(), "new");
    }
}
