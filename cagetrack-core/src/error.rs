//! Error types for cagetrack-core.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{CageName, OrderId, OrderStatus};

/// What a failed reset was aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    /// Retiring the in-cage orders of one cage.
    Cage(CageName),
    /// Clearing the whole ledger.
    Ledger,
}

impl fmt::Display for ResetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetScope::Cage(cage) => write!(f, "cage {cage} has no orders with status 'In Cage'"),
            ResetScope::Ledger => f.write_str("the ledger is already empty"),
        }
    }
}

/// Why a cage rename was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameRejection {
    UnknownCage,
    EmptyName,
    SameName,
    NameTaken,
}

impl fmt::Display for RenameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RenameRejection::UnknownCage => "the old cage is not registered",
            RenameRejection::EmptyName => "the new name is empty",
            RenameRejection::SameName => "the new name equals the old name",
            RenameRejection::NameTaken => "the new name is already registered",
        };
        f.write_str(msg)
    }
}

/// Recoverable, operation-local failures of ledger and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The order id was empty after trimming.
    #[error("order id cannot be empty")]
    EmptyId,

    /// A record with the same id already blocks the insert.
    #[error("order '{id}' is already recorded (status: {status}, scanned at {created_at})")]
    DuplicateOrder {
        id: OrderId,
        cage: Option<CageName>,
        created_at: DateTime<Utc>,
        status: OrderStatus,
    },

    /// No record matches the `(id, created_at)` compound key.
    #[error("no order '{id}' created at {created_at}")]
    NotFound {
        id: OrderId,
        created_at: DateTime<Utc>,
    },

    /// A reset found nothing to act on.
    #[error("nothing to reset: {scope}")]
    NothingToReset { scope: ResetScope },

    /// The cage name is empty or already registered.
    #[error("cage name '{name}' is empty or already registered")]
    DuplicateCage { name: String },

    #[error("cannot rename cage '{from}' to '{to}': {reason}")]
    InvalidRename {
        from: String,
        to: String,
        reason: RenameRejection,
    },

    #[error("bulk count must be between 1 and {max} (got {count})", max = crate::bulk::MAX_BULK_COUNT)]
    InvalidCount { count: i64 },
}

/// All errors that can arise from local snapshot and config persistence.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.cagetrack/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
