//! In-process record store.
//!
//! [`MemoryRecordStore`] keeps every collection in a [`DocumentTable`] behind
//! a mutex and pushes a fresh snapshot to observers after each write. It is
//! used in tests and as the reference for how a store must behave.
//!
//! Failures can be scripted with [`MemoryRecordStore::fail_after`] to
//! exercise rejected and partially applied writes.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{DocumentTable, RecordStore, SnapshotStream};
use crate::document::{CollectionPath, DocumentFields, DocumentKey};
use crate::error::StoreError;

#[derive(Debug)]
struct ScriptedFailure {
    remaining_successes: usize,
    error: StoreError,
}

#[derive(Debug)]
pub struct MemoryRecordStore {
    table: Arc<Mutex<DocumentTable>>,
    revision: watch::Sender<u64>,
    failure: Mutex<Option<ScriptedFailure>>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::unavailable("lock poisoned")
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            table: Arc::new(Mutex::new(DocumentTable::default())),
            revision,
            failure: Mutex::new(None),
        }
    }

    /// Fail the next write with `error`.
    pub fn fail_next(&self, error: StoreError) {
        self.fail_after(0, error);
    }

    /// Let `successes` writes through, then fail the following one with
    /// `error`. Only one failure is scripted at a time.
    pub fn fail_after(&self, successes: usize, error: StoreError) {
        if let Ok(mut slot) = self.failure.lock() {
            *slot = Some(ScriptedFailure {
                remaining_successes: successes,
                error,
            });
        }
    }

    /// Write a document directly, bypassing failure scripting. Observers are
    /// notified as for any other write.
    pub fn put_raw(
        &self,
        collection: &CollectionPath,
        key: DocumentKey,
        fields: DocumentFields,
    ) -> Result<(), StoreError> {
        self.table.lock().map_err(poison_err)?.put(collection, key, fields);
        self.bump();
        Ok(())
    }

    pub fn document_count(&self, collection: &CollectionPath) -> usize {
        self.table
            .lock()
            .map(|table| table.len(collection))
            .unwrap_or(0)
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let mut slot = self.failure.lock().map_err(poison_err)?;
        match slot.as_mut() {
            Some(scripted) if scripted.remaining_successes == 0 => match slot.take() {
                Some(scripted) => Err(scripted.error),
                None => Ok(()),
            },
            Some(scripted) => {
                scripted.remaining_successes -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn write<T>(&self, op: impl FnOnce(&mut DocumentTable) -> Result<T, StoreError>) -> Result<T, StoreError> {
        self.take_failure()?;
        let out = {
            let mut table = self.table.lock().map_err(poison_err)?;
            op(&mut table)?
        };
        self.bump();
        Ok(out)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn observe(&self, collection: &CollectionPath) -> Result<SnapshotStream, StoreError> {
        let table = Arc::clone(&self.table);
        let collection = collection.clone();
        let stream = WatchStream::new(self.revision.subscribe()).map(move |_| {
            table
                .lock()
                .map(|table| table.snapshot(&collection))
                .map_err(poison_err)
        });
        Ok(stream.boxed())
    }

    async fn insert(
        &self,
        collection: &CollectionPath,
        fields: DocumentFields,
    ) -> Result<DocumentKey, StoreError> {
        self.write(|table| Ok(table.insert(collection, fields)))
    }

    async fn update_fields(
        &self,
        collection: &CollectionPath,
        key: &DocumentKey,
        fields: DocumentFields,
    ) -> Result<(), StoreError> {
        self.write(|table| table.update_fields(collection, key, fields))
    }

    async fn delete(&self, collection: &CollectionPath, key: &DocumentKey) -> Result<(), StoreError> {
        self.write(|table| table.delete(collection, key))
    }

    async fn delete_all(&self, collection: &CollectionPath) -> Result<usize, StoreError> {
        self.write(|table| Ok(table.delete_all(collection)))
    }
}
