//! Owned tracker state: the single owner of the cage registry and order ledger.
//!
//! Every mutation goes through a `&mut self` method, so a registry rename and
//! its ledger cascade land together. After each successful mutation the
//! state notifies subscribers with a [`StateChange`]; rendering layers
//! subscribe instead of reaching into the data directly.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};

use crate::aggregate::{self, counts_by_cage, CageCounts};
use crate::bulk;
use crate::error::LedgerError;
use crate::filter::{filter_by_date, filter_by_date_in, DateRange};
use crate::ledger::OrderLedger;
use crate::registry::CageRegistry;
use crate::storage::{StateSnapshot, STATE_VERSION};
use crate::types::{CageName, OrderId, OrderRecord};

/// Notification emitted after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    OrderAdded(OrderRecord),
    BulkAdded { cage: CageName, count: usize },
    CageRetired { cage: CageName, retired: usize },
    OrderDeleted(OrderRecord),
    LedgerCleared { removed: usize },
    CageAdded(CageName),
    CageRenamed {
        from: CageName,
        to: CageName,
        records_updated: usize,
    },
    /// Registry reset; `orphaned` lists cages still referenced by records but
    /// no longer registered.
    CagesReset {
        removed: Vec<CageName>,
        orphaned: Vec<CageName>,
    },
    LedgerReplaced { records: usize },
}

pub type SubscriptionId = u64;

type Subscriber = Box<dyn FnMut(&StateChange) + Send>;

/// Outcome of a successful cage rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CageRename {
    pub from: CageName,
    pub to: CageName,
    pub records_updated: usize,
}

pub struct TrackerState {
    registry: CageRegistry,
    ledger: OrderLedger,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
}

impl fmt::Debug for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerState")
            .field("registry", &self.registry)
            .field("ledger", &self.ledger)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new(CageRegistry::default(), OrderLedger::default())
    }
}

impl TrackerState {
    pub fn new(registry: CageRegistry, ledger: OrderLedger) -> Self {
        Self {
            registry,
            ledger,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &CageRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    pub fn records(&self) -> &[OrderRecord] {
        self.ledger.records()
    }

    pub fn is_valid_cage(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// See [`CageRegistry::resolve_selection`].
    pub fn resolve_selection(&self, current: Option<&str>) -> Option<CageName> {
        self.registry.resolve_selection(current)
    }

    pub fn counts_by_cage(&self) -> CageCounts {
        counts_by_cage(self.registry.cages(), self.ledger.records())
    }

    /// Records within `range`, day boundaries in the local time zone.
    pub fn filter(&self, range: DateRange) -> Vec<&OrderRecord> {
        filter_by_date(self.ledger.records(), range)
    }

    pub fn filter_in<Tz: TimeZone>(&self, range: DateRange, tz: &Tz) -> Vec<&OrderRecord> {
        filter_by_date_in(self.ledger.records(), range, tz)
    }

    /// Cage values referenced by records but missing from the registry.
    pub fn orphaned_cages(&self) -> Vec<CageName> {
        aggregate::orphaned_cages(self.registry.cages(), self.ledger.records())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            version: STATE_VERSION,
            cages: self.registry.cages().to_vec(),
            orders: self.ledger.records().to_vec(),
            saved_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn subscribe(&mut self, subscriber: impl FnMut(&StateChange) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn emit(&mut self, change: StateChange) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&change);
        }
    }

    // -----------------------------------------------------------------------
    // Order operations
    // -----------------------------------------------------------------------

    pub fn add_order(&mut self, raw_id: &str, cage: Option<CageName>) -> Result<OrderRecord, LedgerError> {
        self.add_order_at(raw_id, cage, Utc::now())
    }

    pub fn add_order_at(
        &mut self,
        raw_id: &str,
        cage: Option<CageName>,
        created_at: DateTime<Utc>,
    ) -> Result<OrderRecord, LedgerError> {
        let record = self.ledger.add_order_at(raw_id, cage, created_at)?;
        self.emit(StateChange::OrderAdded(record.clone()));
        Ok(record)
    }

    /// Generate `count` synthetic orders into `cage` and insert them.
    pub fn generate_bulk(&mut self, cage: &CageName, count: i64) -> Result<Vec<OrderRecord>, LedgerError> {
        let batch = bulk::generate_bulk(cage, count)?;
        Ok(self.insert_bulk(cage, batch))
    }

    pub fn generate_bulk_at(
        &mut self,
        cage: &CageName,
        count: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderRecord>, LedgerError> {
        let batch = bulk::generate_bulk_at(cage, count, now)?;
        Ok(self.insert_bulk(cage, batch))
    }

    fn insert_bulk(&mut self, cage: &CageName, batch: Vec<OrderRecord>) -> Vec<OrderRecord> {
        self.ledger.insert_unchecked(batch.clone());
        self.emit(StateChange::BulkAdded {
            cage: cage.clone(),
            count: batch.len(),
        });
        batch
    }

    pub fn retire_cage(&mut self, cage: &str) -> Result<usize, LedgerError> {
        let retired = self.ledger.retire_cage(cage)?;
        self.emit(StateChange::CageRetired {
            cage: CageName::from(cage),
            retired,
        });
        Ok(retired)
    }

    pub fn delete_order(&mut self, id: &OrderId, created_at: &DateTime<Utc>) -> Result<OrderRecord, LedgerError> {
        let removed = self.ledger.delete_order(id, created_at)?;
        self.emit(StateChange::OrderDeleted(removed.clone()));
        Ok(removed)
    }

    pub fn reset_all(&mut self) -> Result<usize, LedgerError> {
        let removed = self.ledger.reset_all()?;
        self.emit(StateChange::LedgerCleared { removed });
        Ok(removed)
    }

    /// Replace every record with an externally supplied snapshot.
    pub fn replace_ledger(&mut self, records: Vec<OrderRecord>) {
        let count = records.len();
        self.ledger.replace_all(records);
        self.emit(StateChange::LedgerReplaced { records: count });
    }

    // -----------------------------------------------------------------------
    // Cage operations
    // -----------------------------------------------------------------------

    pub fn add_cage(&mut self, name: &str) -> Result<CageName, LedgerError> {
        let cage = self.registry.add(name)?;
        self.emit(StateChange::CageAdded(cage.clone()));
        Ok(cage)
    }

    /// Rename a cage and cascade the new name to every record pointing at it.
    pub fn rename_cage(&mut self, old: &str, new: &str) -> Result<CageRename, LedgerError> {
        let (from, to) = self.registry.rename(old, new)?;
        let records_updated = self.ledger.rename_cage_cascade(&from, &to);
        let rename = CageRename {
            from,
            to,
            records_updated,
        };
        self.emit(StateChange::CageRenamed {
            from: rename.from.clone(),
            to: rename.to.clone(),
            records_updated,
        });
        Ok(rename)
    }

    /// Reset the registry to its defaults. Records keep their cage values.
    ///
    /// Returns the cages that are now orphaned by records.
    pub fn reset_cages_to_default(&mut self) -> Vec<CageName> {
        let removed = self.registry.reset_to_default();
        let orphaned = self.orphaned_cages();
        self.emit(StateChange::CagesReset {
            removed,
            orphaned: orphaned.clone(),
        });
        orphaned
    }
}
