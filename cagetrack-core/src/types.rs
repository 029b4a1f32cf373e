//! Domain types for cage tracking.
//!
//! Order and cage identifiers are newtypes over `String`; timestamps are
//! always `DateTime<Utc>`. Every type round-trips through serde so the same
//! shapes are used by the YAML snapshot, sheet export and the record store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a scanned order (barcode or generated bulk id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name of a physical holding cage. The name is the cage's only identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CageName(pub String);

impl CageName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CageName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CageName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of an order record.
///
/// `InCage` is the only initial state and `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "In Cage")]
    InCage,
    Completed,
    /// Reserved terminal state; nothing transitions into it yet.
    Cancelled,
}

impl OrderStatus {
    /// Operator-facing label, also the wire value used by the record store.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::InCage => "In Cage",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Lenient parse of a status label (`"In Cage"`, `"in_cage"`, `"COMPLETED"`, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "incage" => Some(OrderStatus::InCage),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" | "canceled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_in_cage(self) -> bool {
        matches!(self, OrderStatus::InCage)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which existing records block re-adding the same order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Only records still occupying a cage block a new scan. A completed id
    /// can be scanned again later.
    #[default]
    InCage,
    /// Any record with the same id blocks a new scan, whatever its status.
    AllStatuses,
}

impl DuplicatePolicy {
    pub fn blocks(self, record: &OrderRecord) -> bool {
        match self {
            DuplicatePolicy::InCage => record.status.is_in_cage(),
            DuplicatePolicy::AllStatuses => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Natural key of an order record: `created_at` disambiguates a re-used id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.created_at.to_rfc3339())
    }
}

/// A single order scanned into (or generated for) a cage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    /// `None` means the order is not assigned to any cage.
    pub cage: Option<CageName>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: OrderStatus,
}

impl OrderRecord {
    /// A fresh record in its initial `InCage` state.
    pub fn in_cage(id: OrderId, cage: Option<CageName>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            cage,
            created_at,
            status: OrderStatus::InCage,
        }
    }

    pub fn key(&self) -> OrderKey {
        OrderKey {
            id: self.id.clone(),
            created_at: self.created_at,
        }
    }

    pub fn matches_key(&self, id: &OrderId, created_at: &DateTime<Utc>) -> bool {
        self.id == *id && self.created_at == *created_at
    }

    pub fn in_cage_named(&self, cage: &str) -> bool {
        self.status.is_in_cage() && self.cage_is(cage)
    }

    pub fn cage_is(&self, cage: &str) -> bool {
        self.cage.as_ref().is_some_and(|c| c.0 == cage)
    }

    /// Cage label for display; unassigned orders render as `-`.
    pub fn cage_label(&self) -> &str {
        self.cage.as_ref().map(CageName::as_str).unwrap_or("-")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
