//! # cagetrack-sync
//!
//! Record Store boundary and the Sync Reconciler.
//!
//! A [`RecordStore`] pushes full snapshots of a collection; the
//! [`SyncReconciler`] turns each snapshot into an [`OrderLedger`] view and
//! forwards write operations to the store without touching that view. The
//! feed is the only thing that ever changes what readers see.
//!
//! [`OrderLedger`]: cagetrack_core::OrderLedger

pub mod document;
pub mod error;
pub mod reconciler;
pub mod store;

pub use document::{CollectionPath, DocumentFields, DocumentKey, StoreDocument};
pub use error::{StoreError, StoreErrorKind, SyncError};
pub use reconciler::{ReconciledView, SyncReconciler};
pub use store::{file::JsonFileStore, memory::MemoryRecordStore, RecordStore, SnapshotStream};
