//! Record store boundary.
//!
//! A store is a keyed document collection with a push feed. Each item on the
//! feed is the complete current document set of one collection; the first
//! item is delivered as soon as the feed is observed.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::document::{CollectionPath, DocumentFields, DocumentKey, StoreDocument};
use crate::error::StoreError;

/// Push feed of full collection snapshots.
pub type SnapshotStream = BoxStream<'static, Result<Vec<StoreDocument>, StoreError>>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Subscribe to snapshots of `collection`.
    async fn observe(&self, collection: &CollectionPath) -> Result<SnapshotStream, StoreError>;

    /// Insert a document and return its store-assigned key.
    async fn insert(
        &self,
        collection: &CollectionPath,
        fields: DocumentFields,
    ) -> Result<DocumentKey, StoreError>;

    /// Merge `fields` into an existing document.
    async fn update_fields(
        &self,
        collection: &CollectionPath,
        key: &DocumentKey,
        fields: DocumentFields,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &CollectionPath, key: &DocumentKey) -> Result<(), StoreError>;

    /// Remove every document of `collection`. Returns how many were removed.
    async fn delete_all(&self, collection: &CollectionPath) -> Result<usize, StoreError>;
}

/// Documents grouped by collection, shared by the bundled stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentTable {
    collections: BTreeMap<CollectionPath, BTreeMap<DocumentKey, DocumentFields>>,
}

impl DocumentTable {
    /// Current documents of `collection`, ordered by key.
    pub fn snapshot(&self, collection: &CollectionPath) -> Vec<StoreDocument> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(key, fields)| StoreDocument::new(key.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, collection: &CollectionPath) -> usize {
        self.collections.get(collection).map_or(0, BTreeMap::len)
    }

    /// Insert under a fresh random key.
    pub fn insert(&mut self, collection: &CollectionPath, fields: DocumentFields) -> DocumentKey {
        let key = DocumentKey(uuid::Uuid::new_v4().simple().to_string());
        self.put(collection, key.clone(), fields);
        key
    }

    /// Insert or overwrite the document at `key`.
    pub fn put(&mut self, collection: &CollectionPath, key: DocumentKey, fields: DocumentFields) {
        self.collections
            .entry(collection.clone())
            .or_default()
            .insert(key, fields);
    }

    pub fn update_fields(
        &mut self,
        collection: &CollectionPath,
        key: &DocumentKey,
        fields: DocumentFields,
    ) -> Result<(), StoreError> {
        let doc = self
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| missing(collection, key))?;
        doc.extend(fields);
        Ok(())
    }

    pub fn delete(&mut self, collection: &CollectionPath, key: &DocumentKey) -> Result<(), StoreError> {
        self.collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(key))
            .map(|_| ())
            .ok_or_else(|| missing(collection, key))
    }

    pub fn delete_all(&mut self, collection: &CollectionPath) -> usize {
        self.collections
            .remove(collection)
            .map_or(0, |docs| docs.len())
    }
}

fn missing(collection: &CollectionPath, key: &DocumentKey) -> StoreError {
    StoreError::not_found(format!("document {key} not found in {collection}"))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn fields(value: Value) -> DocumentFields {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn update_merges_and_keeps_other_fields() {
        let collection = CollectionPath::from("c");
        let mut table = DocumentTable::default();
        let key = table.insert(&collection, fields(json!({ "id": "a", "status": "In Cage" })));
        table
            .update_fields(&collection, &key, fields(json!({ "status": "Completed" })))
            .expect("update");

        let docs = table.snapshot(&collection);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields["id"], json!("a"));
        assert_eq!(docs[0].fields["status"], json!("Completed"));
    }

    #[test]
    fn missing_document_is_not_found() {
        let collection = CollectionPath::from("c");
        let mut table = DocumentTable::default();
        let err = table
            .delete(&collection, &DocumentKey::from("nope"))
            .unwrap_err();
        assert_eq!(err.kind, crate::error::StoreErrorKind::NotFound);
    }

    #[test]
    fn collections_are_isolated() {
        let mut table = DocumentTable::default();
        table.insert(&CollectionPath::from("a"), DocumentFields::new());
        table.insert(&CollectionPath::from("b"), DocumentFields::new());
        assert_eq!(table.delete_all(&CollectionPath::from("a")), 1);
        assert_eq!(table.len(&CollectionPath::from("b")), 1);
    }
}
