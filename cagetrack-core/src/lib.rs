//! Cagetrack core library: order/cage domain types, the order ledger,
//! cage registry, derived views, owned state and local persistence.
//!
//! Public API surface:
//! - [`types`]: newtypes and the order record
//! - [`error`]: [`LedgerError`], [`PersistError`]
//! - [`registry`]: ordered cage registry
//! - [`ledger`]: order ledger and status transitions
//! - [`aggregate`] / [`filter`] / [`bulk`]: derived views and synthetic orders
//! - [`state`]: [`TrackerState`], the single owner of registry + ledger
//! - [`storage`] / [`config`]: `~/.cagetrack/` layout, snapshot and config files

pub mod aggregate;
pub mod bulk;
pub mod config;
pub mod error;
pub mod filter;
pub mod ledger;
pub mod registry;
pub mod state;
pub mod storage;
pub mod types;

pub use aggregate::{counts_by_cage, orphaned_cages, CageCount, CageCounts};
pub use bulk::MAX_BULK_COUNT;
pub use config::{BackendConfig, TrackerConfig};
pub use error::{LedgerError, PersistError, RenameRejection, ResetScope};
pub use filter::DateRange;
pub use ledger::OrderLedger;
pub use registry::{CageRegistry, DEFAULT_CAGES};
pub use state::{StateChange, SubscriptionId, TrackerState};
pub use storage::StateSnapshot;
pub use types::{CageName, DuplicatePolicy, OrderId, OrderKey, OrderRecord, OrderStatus};
