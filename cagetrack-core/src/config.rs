//! Optional `~/.cagetrack/config.yaml`.
//!
//! Every field is optional; a missing file is the default configuration.
//!
//! ```yaml
//! default_cages: [A-01, A-02, B-01]
//! duplicate_policy: in_cage        # or all_statuses
//! export_dir: /srv/exports
//! backend:
//!   kind: shared
//!   store_path: /mnt/share/cagetrack.json
//!   collection: warehouse-1/orders
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::registry::DEFAULT_CAGES;
use crate::storage::{config_path_at, default_export_dir_at, default_store_path_at, home};
use crate::types::{CageName, DuplicatePolicy};

/// Collection used by the shared backend when none is configured.
pub const DEFAULT_COLLECTION: &str = "cagetrack/orders";

/// Where order records live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// `state.yaml` is authoritative; mutations apply immediately.
    #[default]
    Local,
    /// A shared record store is authoritative; local state follows its feed.
    Shared {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store_path: Option<PathBuf>,
        #[serde(default = "default_collection")]
        collection: String,
    },
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TrackerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_cages: Option<Vec<String>>,
    pub duplicate_policy: DuplicatePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
    pub backend: BackendConfig,
}

impl TrackerConfig {
    /// Configured default cages, or the built-in list when unset or empty.
    pub fn default_cages(&self) -> Vec<CageName> {
        let configured: Vec<CageName> = self
            .default_cages
            .iter()
            .flatten()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(CageName::from)
            .collect();
        if configured.is_empty() {
            DEFAULT_CAGES.iter().map(|c| CageName::from(*c)).collect()
        } else {
            configured
        }
    }

    pub fn export_dir_at(&self, home: &Path) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| default_export_dir_at(home))
    }

    /// Store file and collection for the shared backend, `None` for local.
    pub fn shared_store_at(&self, home: &Path) -> Option<(PathBuf, String)> {
        match &self.backend {
            BackendConfig::Local => None,
            BackendConfig::Shared {
                store_path,
                collection,
            } => Some((
                store_path
                    .clone()
                    .unwrap_or_else(|| default_store_path_at(home)),
                collection.clone(),
            )),
        }
    }
}

/// Load `<home>/.cagetrack/config.yaml`, defaulting when absent.
pub fn load_config_at(home: &Path) -> Result<TrackerConfig, PersistError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(TrackerConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(TrackerConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| PersistError::Parse { path, source: e })
}

/// `load_config_at` convenience wrapper.
pub fn load_config() -> Result<TrackerConfig, PersistError> {
    load_config_at(&home()?)
}
