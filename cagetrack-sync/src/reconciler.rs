//! Sync reconciler: the store's push feed is the single source of truth.
//!
//! # Architecture
//!
//! ```text
//!  RecordStore::observe ──► feed task ──► RwLock<ReconciledView> ──► readers
//!          ▲                    │
//!          │                    └──► watch<u64> generation ──► wait_until()
//!          │
//!  write-through ops (add / bulk / retire / delete / reset / rename)
//! ```
//!
//! Write operations validate against the current reconciled view and then
//! call the store. They never modify the reconciled ledger; the resulting
//! change becomes visible when the store pushes its next snapshot.
//!
//! Inserts that the store accepted but no snapshot has shown yet are kept
//! aside as unconfirmed, and new ids are checked against them too, so two
//! quick scans of the same id cannot both reach the store.
//!
//! Multi-document writes are issued one document at a time. If one fails the
//! earlier writes stay committed and the operation reports
//! [`SyncError::PartialWrite`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use cagetrack_core::bulk::generate_bulk;
use cagetrack_core::state::CageRename;
use cagetrack_core::{
    counts_by_cage, CageCounts, CageName, CageRegistry, DuplicatePolicy, LedgerError, OrderId,
    OrderKey, OrderLedger, OrderRecord, OrderStatus, ResetScope,
};

use crate::document::{
    cage_patch, fields_for_record, record_from_document, status_patch, CollectionPath,
    DocumentKey, StoreDocument,
};
use crate::error::{StoreError, SyncError};
use crate::store::{RecordStore, SnapshotStream};

// ---------------------------------------------------------------------------
// 1. Reconciled view
// ---------------------------------------------------------------------------

/// The ledger as last pushed by the store, plus the document key of every
/// record.
#[derive(Debug, Clone, Default)]
pub struct ReconciledView {
    ledger: OrderLedger,
    keys: HashMap<OrderKey, DocumentKey>,
    generation: u64,
    last_error: Option<StoreError>,
    /// Inserts sent to the store and not yet seen in a snapshot.
    unconfirmed: Vec<OrderRecord>,
}

impl ReconciledView {
    fn new(policy: DuplicatePolicy) -> Self {
        Self {
            ledger: OrderLedger::new(policy),
            ..Self::default()
        }
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    pub fn records(&self) -> &[OrderRecord] {
        self.ledger.records()
    }

    /// Number of snapshots applied so far. `0` until the first one arrives.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Error reported by the feed since the last good snapshot.
    pub fn last_error(&self) -> Option<&StoreError> {
        self.last_error.as_ref()
    }

    pub fn document_key(&self, id: &OrderId, created_at: &DateTime<Utc>) -> Option<&DocumentKey> {
        self.keys.get(&OrderKey {
            id: id.clone(),
            created_at: *created_at,
        })
    }

    pub fn contains(&self, id: &OrderId, created_at: &DateTime<Utc>) -> bool {
        self.ledger.get(id, created_at).is_some()
    }

    /// Inserts the store accepted that no snapshot has included yet.
    pub fn unconfirmed(&self) -> &[OrderRecord] {
        &self.unconfirmed
    }

    /// `validate_new_id` against the ledger, then against unconfirmed inserts.
    fn check_new_id(&self, raw: &str) -> Result<OrderId, LedgerError> {
        let id = self.ledger.validate_new_id(raw)?;
        let policy = self.ledger.policy();
        match self
            .unconfirmed
            .iter()
            .find(|r| r.id == id && policy.blocks(r))
        {
            Some(sent) => Err(LedgerError::DuplicateOrder {
                id,
                cage: sent.cage.clone(),
                created_at: sent.created_at,
                status: sent.status,
            }),
            None => Ok(id),
        }
    }

    fn forget_unconfirmed(&mut self, key: &OrderKey) {
        self.unconfirmed.retain(|r| r.key() != *key);
    }

    fn apply_snapshot(&mut self, documents: Vec<StoreDocument>) {
        let mut keys = HashMap::with_capacity(documents.len());
        let records: Vec<OrderRecord> = documents
            .iter()
            .map(|doc| {
                let record = record_from_document(doc);
                keys.insert(record.key(), doc.key.clone());
                record
            })
            .collect();
        self.ledger.replace_all(records);
        self.keys = keys;
        let keys = &self.keys;
        self.unconfirmed.retain(|r| !keys.contains_key(&r.key()));
        self.generation += 1;
        self.last_error = None;
    }

    fn keys_where(&self, pred: impl Fn(&OrderRecord) -> bool) -> Vec<DocumentKey> {
        self.ledger
            .records()
            .iter()
            .filter(|r| pred(r))
            .filter_map(|r| self.keys.get(&r.key()).cloned())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// 2. Reconciler
// ---------------------------------------------------------------------------

pub struct SyncReconciler<S: RecordStore + 'static> {
    store: Arc<S>,
    collection: CollectionPath,
    view: Arc<RwLock<ReconciledView>>,
    generation_rx: watch::Receiver<u64>,
    pending: Mutex<HashSet<String>>,
    feed: JoinHandle<()>,
}

impl<S: RecordStore + 'static> SyncReconciler<S> {
    /// Subscribe to `collection` and start applying its snapshots.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(
        store: Arc<S>,
        collection: CollectionPath,
        policy: DuplicatePolicy,
    ) -> Result<Self, SyncError> {
        let feed = store.observe(&collection).await?;
        let view = Arc::new(RwLock::new(ReconciledView::new(policy)));
        let (generation_tx, generation_rx) = watch::channel(0u64);

        let task = tokio::spawn(feed_task(
            feed,
            Arc::clone(&view),
            generation_tx,
            collection.clone(),
        ));

        tracing::debug!(collection = %collection, "reconciler started");
        Ok(Self {
            store,
            collection,
            view,
            generation_rx,
            pending: Mutex::new(HashSet::new()),
            feed: task,
        })
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Clone of the current reconciled view.
    pub async fn view(&self) -> ReconciledView {
        self.view.read().await.clone()
    }

    pub async fn records(&self) -> Vec<OrderRecord> {
        self.view.read().await.records().to_vec()
    }

    pub async fn counts_by_cage(&self, registry: &CageRegistry) -> CageCounts {
        counts_by_cage(registry.cages(), self.view.read().await.records())
    }

    pub fn generation(&self) -> u64 {
        *self.generation_rx.borrow()
    }

    /// Receiver that changes whenever a snapshot has been applied.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation_rx.clone()
    }

    /// Wait until `pred` holds for the reconciled view.
    ///
    /// Returns the generation at which it held, or [`SyncError::FeedClosed`]
    /// if the feed ends first.
    pub async fn wait_until<F>(&self, mut pred: F) -> Result<u64, SyncError>
    where
        F: FnMut(&ReconciledView) -> bool,
    {
        let mut rx = self.generation_rx.clone();
        loop {
            let _ = rx.borrow_and_update();
            {
                let view = self.view.read().await;
                if pred(&view) {
                    return Ok(view.generation);
                }
            }
            rx.changed().await.map_err(|_| SyncError::FeedClosed)?;
        }
    }

    pub async fn wait_for_generation(&self, min: u64) -> Result<u64, SyncError> {
        self.wait_until(|view| view.generation >= min).await
    }

    /// Wait for the first snapshot.
    pub async fn ready(&self) -> Result<u64, SyncError> {
        self.wait_for_generation(1).await
    }

    // -----------------------------------------------------------------------
    // Write-through operations
    // -----------------------------------------------------------------------

    /// Validate `raw_id` against the reconciled ledger and unconfirmed
    /// inserts, then insert one in-cage document. Returns the record as
    /// written.
    pub async fn add_order(
        &self,
        raw_id: &str,
        cage: Option<CageName>,
    ) -> Result<OrderRecord, SyncError> {
        let record = {
            let mut view = self.view.write().await;
            let id = view.check_new_id(raw_id)?;
            let record = OrderRecord::in_cage(id, cage, Utc::now());
            view.unconfirmed.push(record.clone());
            record
        };

        if let Err(err) = self
            .store
            .insert(&self.collection, fields_for_record(&record))
            .await
        {
            self.view.write().await.forget_unconfirmed(&record.key());
            return Err(self.rejected("add order", err));
        }
        tracing::debug!(id = %record.id, cage = record.cage_label(), "order insert sent");
        Ok(record)
    }

    /// Insert `count` synthetic in-cage documents for `cage`.
    pub async fn generate_bulk(
        &self,
        cage: &CageName,
        count: i64,
    ) -> Result<Vec<OrderRecord>, SyncError> {
        let batch = generate_bulk(cage, count)?;
        let _guard = self.begin(format!("bulk {cage}"))?;

        let total = batch.len();
        for (committed, record) in batch.iter().enumerate() {
            if let Err(err) = self
                .store
                .insert(&self.collection, fields_for_record(record))
                .await
            {
                return Err(self.partial("bulk insert", committed, total, err));
            }
        }
        tracing::info!(cage = %cage, count = total, "bulk orders sent");
        Ok(batch)
    }

    /// Mark every in-cage record of `cage` completed, one update per document.
    pub async fn retire_cage(&self, cage: &str) -> Result<usize, SyncError> {
        let _guard = self.begin(format!("retire {cage}"))?;
        let targets = self
            .view
            .read()
            .await
            .keys_where(|r| r.in_cage_named(cage));
        if targets.is_empty() {
            return Err(LedgerError::NothingToReset {
                scope: ResetScope::Cage(CageName::from(cage)),
            }
            .into());
        }

        let total = targets.len();
        for (committed, key) in targets.iter().enumerate() {
            if let Err(err) = self
                .store
                .update_fields(&self.collection, key, status_patch(OrderStatus::Completed))
                .await
            {
                return Err(self.partial("retire cage", committed, total, err));
            }
        }
        tracing::info!(cage, retired = total, "cage retire sent");
        Ok(total)
    }

    /// Delete the document of the record with this compound key.
    pub async fn delete_order(
        &self,
        id: &OrderId,
        created_at: &DateTime<Utc>,
    ) -> Result<OrderRecord, SyncError> {
        let (record, key) = {
            let view = self.view.read().await;
            let record = view.ledger.get(id, created_at).cloned();
            let key = view.document_key(id, created_at).cloned();
            match record.zip(key) {
                Some(found) => found,
                None => {
                    return Err(LedgerError::NotFound {
                        id: id.clone(),
                        created_at: *created_at,
                    }
                    .into())
                }
            }
        };
        let _guard = self.begin(format!("delete {}", record.key()))?;

        self.store
            .delete(&self.collection, &key)
            .await
            .map_err(|err| self.rejected("delete order", err))?;
        Ok(record)
    }

    /// Remove every document of the collection.
    pub async fn reset_all(&self) -> Result<usize, SyncError> {
        let _guard = self.begin("reset all".to_string())?;
        if self.view.read().await.ledger.is_empty() {
            return Err(LedgerError::NothingToReset {
                scope: ResetScope::Ledger,
            }
            .into());
        }
        let removed = self
            .store
            .delete_all(&self.collection)
            .await
            .map_err(|err| self.rejected("reset all", err))?;
        tracing::info!(removed, "ledger reset sent");
        Ok(removed)
    }

    /// Rename a cage: rewrite `cage` on every matching document (any
    /// status), then rename it in `registry`.
    ///
    /// The registry is only touched once every document update succeeded, so
    /// a partially applied cascade can be finished by renaming again.
    pub async fn rename_cage(
        &self,
        registry: &mut CageRegistry,
        old: &str,
        new: &str,
    ) -> Result<CageRename, SyncError> {
        let (_, target) = registry.check_rename(old, new)?;
        let _guard = self.begin(format!("rename {old}"))?;

        let targets = self.view.read().await.keys_where(|r| r.cage_is(old));
        let total = targets.len();
        let patch = cage_patch(&target);
        for (committed, key) in targets.iter().enumerate() {
            if let Err(err) = self
                .store
                .update_fields(&self.collection, key, patch.clone())
                .await
            {
                return Err(self.partial("rename cage", committed, total, err));
            }
        }

        let (from, to) = registry.rename(old, new)?;
        tracing::info!(from = %from, to = %to, records = total, "cage rename sent");
        Ok(CageRename {
            from,
            to,
            records_updated: total,
        })
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn begin(&self, operation: String) -> Result<PendingGuard<'_>, SyncError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| StoreError::unavailable("pending set poisoned"))?;
        if !pending.insert(operation.clone()) {
            return Err(SyncError::AlreadyPending { operation });
        }
        Ok(PendingGuard {
            pending: &self.pending,
            operation,
        })
    }

    fn rejected(&self, operation: &'static str, err: StoreError) -> SyncError {
        tracing::warn!(operation, collection = %self.collection, error = %err, "store write rejected");
        SyncError::Store(err)
    }

    fn partial(
        &self,
        operation: &'static str,
        committed: usize,
        total: usize,
        err: StoreError,
    ) -> SyncError {
        if committed == 0 {
            return self.rejected(operation, err);
        }
        tracing::warn!(
            operation,
            committed,
            total,
            collection = %self.collection,
            error = %err,
            "store write failed partway",
        );
        SyncError::PartialWrite {
            operation,
            committed,
            total,
            source: err,
        }
    }
}

impl<S: RecordStore + 'static> Drop for SyncReconciler<S> {
    fn drop(&mut self) {
        self.feed.abort();
    }
}

/// Removes its operation from the pending set when dropped.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashSet<String>>,
    operation: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.operation);
        }
    }
}

async fn feed_task(
    mut feed: SnapshotStream,
    view: Arc<RwLock<ReconciledView>>,
    generation_tx: watch::Sender<u64>,
    collection: CollectionPath,
) {
    while let Some(item) = feed.next().await {
        match item {
            Ok(documents) => {
                let count = documents.len();
                let generation = {
                    let mut view = view.write().await;
                    view.apply_snapshot(documents);
                    view.generation
                };
                tracing::debug!(collection = %collection, records = count, generation, "snapshot applied");
                generation_tx.send_replace(generation);
            }
            Err(err) => {
                tracing::warn!(collection = %collection, error = %err, "store feed error");
                view.write().await.last_error = Some(err);
            }
        }
    }
    tracing::info!(collection = %collection, "store feed ended");
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
