//! Error types for cagetrack-sync.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use cagetrack_core::LedgerError;

/// Coarse classification of a record store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The store refused the caller; needs its own operator-facing message.
    PermissionDenied,
    /// The addressed document does not exist.
    NotFound,
    /// The store could not be reached or its worker failed.
    Unavailable,
    /// Local I/O failure underneath the store.
    Io,
    /// Stored data could not be decoded.
    Malformed,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StoreErrorKind::PermissionDenied => "permission denied",
            StoreErrorKind::NotFound => "not found",
            StoreErrorKind::Unavailable => "unavailable",
            StoreErrorKind::Io => "I/O error",
            StoreErrorKind::Malformed => "malformed data",
        };
        f.write_str(label)
    }
}

/// Any failure reported by a record store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::PermissionDenied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Malformed, message)
    }

    pub fn is_permission_denied(&self) -> bool {
        self.kind == StoreErrorKind::PermissionDenied
    }
}

/// Convenience constructor mapping an I/O failure at `path`.
pub(crate) fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    let kind = match source.kind() {
        std::io::ErrorKind::PermissionDenied => StoreErrorKind::PermissionDenied,
        _ => StoreErrorKind::Io,
    };
    StoreError::new(kind, format!("{}: {source}", path.display()))
}

/// All errors surfaced by the reconciler's operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The operation was refused by ledger or registry rules.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The store rejected the write; nothing was committed.
    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    /// A multi-document write failed partway; earlier writes stay committed.
    #[error("{operation} failed after {committed} of {total} writes: {source}")]
    PartialWrite {
        operation: &'static str,
        committed: usize,
        total: usize,
        #[source]
        source: StoreError,
    },

    /// The same logical operation is still in flight.
    #[error("operation already in progress: {operation}")]
    AlreadyPending { operation: String },

    /// The store's push feed ended.
    #[error("record store feed closed")]
    FeedClosed,
}

impl SyncError {
    /// The underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            SyncError::Store(err) | SyncError::PartialWrite { source: err, .. } => Some(err),
            _ => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.store_error()
            .is_some_and(StoreError::is_permission_denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_io_maps_to_kind() {
        let err = io_err(
            Path::new("/srv/store.json"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.is_permission_denied());
        assert!(err.to_string().contains("/srv/store.json"));
    }

    #[test]
    fn partial_write_exposes_source() {
        let err = SyncError::PartialWrite {
            operation: "bulk insert",
            committed: 2,
            total: 5,
            source: StoreError::permission_denied("rules"),
        };
        assert!(err.is_permission_denied());
        assert!(err.to_string().contains("2 of 5"));
    }
}
