//! Store documents and the mapping to and from [`OrderRecord`].
//!
//! A document is a flat JSON object with four recognised fields:
//!
//! | field       | meaning                                        |
//! |-------------|------------------------------------------------|
//! | `id`        | order id string                                |
//! | `cage`      | cage name, or `null` when unassigned           |
//! | `createdAt` | store-native timestamp                         |
//! | `status`    | `"In Cage"` / `"Completed"` / `"Cancelled"`    |
//!
//! Reads are lenient: any field may be missing or garbled and the document
//! still maps to a record (see [`record_from_document`]).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use cagetrack_core::{CageName, OrderId, OrderRecord, OrderStatus};

pub const FIELD_ID: &str = "id";
pub const FIELD_CAGE: &str = "cage";
pub const FIELD_CREATED_AT: &str = "createdAt";
pub const FIELD_STATUS: &str = "status";

/// Field map of a single document.
pub type DocumentFields = Map<String, Value>;

/// Deployment-specific collection identifier. Opaque to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(pub String);

impl CollectionPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionPath {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CollectionPath {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Store-assigned document key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(pub String);

impl DocumentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub key: DocumentKey,
    pub fields: DocumentFields,
}

impl StoreDocument {
    pub fn new(key: DocumentKey, fields: DocumentFields) -> Self {
        Self { key, fields }
    }
}

// ---------------------------------------------------------------------------
// 1. Record -> fields
// ---------------------------------------------------------------------------

/// All four fields of a new record.
pub fn fields_for_record(record: &OrderRecord) -> DocumentFields {
    let mut fields = Map::new();
    fields.insert(FIELD_ID.into(), Value::String(record.id.as_str().to_string()));
    fields.insert(
        FIELD_CAGE.into(),
        record
            .cage
            .as_ref()
            .map_or(Value::Null, |c| Value::String(c.as_str().to_string())),
    );
    fields.insert(FIELD_CREATED_AT.into(), store_timestamp(&record.created_at));
    fields.insert(
        FIELD_STATUS.into(),
        Value::String(record.status.as_str().to_string()),
    );
    fields
}

/// Partial update setting only `status`.
pub fn status_patch(status: OrderStatus) -> DocumentFields {
    let mut fields = Map::new();
    fields.insert(FIELD_STATUS.into(), Value::String(status.as_str().to_string()));
    fields
}

/// Partial update setting only `cage`.
pub fn cage_patch(cage: &CageName) -> DocumentFields {
    let mut fields = Map::new();
    fields.insert(FIELD_CAGE.into(), Value::String(cage.as_str().to_string()));
    fields
}

/// Store-native timestamp: `{ "seconds": i64, "nanoseconds": u32 }`.
pub fn store_timestamp(at: &DateTime<Utc>) -> Value {
    json!({
        "seconds": at.timestamp(),
        "nanoseconds": at.timestamp_subsec_nanos(),
    })
}

// ---------------------------------------------------------------------------
// 2. Fields -> record
// ---------------------------------------------------------------------------

/// Map a document to a record, defaulting anything missing or malformed.
///
/// - `id` missing or blank: the document key
/// - `cage` missing, null, or blank: unassigned
/// - `createdAt` missing or unparseable: the Unix epoch
/// - `status` missing or unknown: `In Cage`
pub fn record_from_document(doc: &StoreDocument) -> OrderRecord {
    let fields = &doc.fields;
    let id = non_blank(fields.get(FIELD_ID))
        .map(OrderId::from)
        .unwrap_or_else(|| OrderId::from(doc.key.as_str()));
    let cage = non_blank(fields.get(FIELD_CAGE)).map(CageName::from);
    let created_at = fields
        .get(FIELD_CREATED_AT)
        .and_then(parse_store_timestamp)
        .unwrap_or_else(unix_epoch);
    let status = fields
        .get(FIELD_STATUS)
        .and_then(Value::as_str)
        .and_then(OrderStatus::parse)
        .unwrap_or_default();

    OrderRecord {
        id,
        cage,
        created_at,
        status,
    }
}

/// Accepts the native `{seconds, nanoseconds}` object (with or without a
/// leading underscore), an RFC 3339 string, or epoch milliseconds.
pub fn parse_store_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Creation instant given to documents without a usable `createdAt`.
pub fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
