//! Local snapshot persistence for the local-only variant.
//!
//! # Storage layout
//!
//! ```text
//! ~/.cagetrack/
//!   config.yaml   (optional, see `config`)
//!   state.yaml    (cages + orders: mode 0600)
//!   exports/      (default sheet export directory)
//!   store.json    (default shared record store file)
//! ```
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::error::PersistError;
use crate::ledger::OrderLedger;
use crate::registry::CageRegistry;
use crate::state::TrackerState;
use crate::types::{CageName, OrderRecord};

/// Current `state.yaml` schema version.
pub const STATE_VERSION: u32 = 1;

/// On-disk snapshot of the registry and ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    #[serde(default)]
    pub cages: Vec<CageName>,
    #[serde(default)]
    pub orders: Vec<OrderRecord>,
    pub saved_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.cagetrack/`
pub fn cagetrack_root(home: &Path) -> PathBuf {
    home.join(".cagetrack")
}

/// `<home>/.cagetrack/state.yaml`: pure, no I/O.
pub fn state_path_at(home: &Path) -> PathBuf {
    cagetrack_root(home).join("state.yaml")
}

/// `<home>/.cagetrack/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    cagetrack_root(home).join("config.yaml")
}

/// `<home>/.cagetrack/exports/`: pure, no I/O.
pub fn default_export_dir_at(home: &Path) -> PathBuf {
    cagetrack_root(home).join("exports")
}

/// `<home>/.cagetrack/store.json`: pure, no I/O.
pub fn default_store_path_at(home: &Path) -> PathBuf {
    cagetrack_root(home).join("store.json")
}

/// Creates `<home>/.cagetrack/` (mode `0700`) if it does not yet exist.
pub fn ensure_root_at(home: &Path) -> Result<PathBuf, PersistError> {
    let dir = cagetrack_root(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load `state.yaml`. Returns `Ok(None)` when no snapshot has been saved yet,
/// `PersistError::Parse` (with path + line context) if malformed YAML.
pub fn load_state_at(home: &Path) -> Result<Option<StateSnapshot>, PersistError> {
    let path = state_path_at(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|e| PersistError::Parse { path, source: e })
}

/// `load_state_at` convenience wrapper.
pub fn load_state() -> Result<Option<StateSnapshot>, PersistError> {
    load_state_at(&home()?)
}

/// Open the tracker state for `home`: the saved snapshot if present, else a
/// fresh state seeded with the configured default cages.
pub fn open_state_at(home: &Path, config: &TrackerConfig) -> Result<TrackerState, PersistError> {
    let defaults = config.default_cages();
    let policy = config.duplicate_policy;
    let state = match load_state_at(home)? {
        Some(snapshot) => TrackerState::new(
            CageRegistry::restore(snapshot.cages, defaults),
            OrderLedger::from_records(snapshot.orders, policy),
        ),
        None => TrackerState::new(
            CageRegistry::seeded(defaults),
            OrderLedger::new(policy),
        ),
    };
    Ok(state)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a snapshot to `<home>/.cagetrack/state.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem: no EXDEV).
pub fn save_state_at(home: &Path, snapshot: &StateSnapshot) -> Result<(), PersistError> {
    ensure_root_at(home)?;
    let path = state_path_at(home);
    let tmp_path = path.with_file_name("state.yaml.tmp");

    let yaml = serde_yaml::to_string(snapshot)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_state_at` convenience wrapper.
pub fn save_state(snapshot: &StateSnapshot) -> Result<(), PersistError> {
    save_state_at(&home()?, snapshot)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, PersistError> {
    dirs::home_dir().ok_or(PersistError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), PersistError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), PersistError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), PersistError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), PersistError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
