//! One CLI invocation's view of the tracker.
//!
//! | Backend | Orders live in              | Writes                              |
//! |---------|-----------------------------|-------------------------------------|
//! | local   | `~/.cagetrack/state.yaml`   | applied to `TrackerState`, saved    |
//! | shared  | the JSON record store file  | forwarded by the reconciler         |
//!
//! The cage registry is always local. In shared mode a command waits (up to
//! [`SETTLE_TIMEOUT`]) for the store feed to reflect its own write, so the
//! output of the next command is consistent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use cagetrack_core::config::load_config_at;
use cagetrack_core::state::CageRename;
use cagetrack_core::storage::{open_state_at, save_state_at, STATE_VERSION};
use cagetrack_core::{
    counts_by_cage, orphaned_cages, CageCounts, CageName, CageRegistry, OrderId, OrderRecord,
    StateSnapshot, TrackerConfig, TrackerState,
};
use cagetrack_sync::{CollectionPath, JsonFileStore, ReconciledView, SyncReconciler};

/// Longest a command waits for the store feed after a write.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Session {
    home: PathBuf,
    config: TrackerConfig,
    backend: Backend,
}

enum Backend {
    Local(TrackerState),
    Shared(Box<SharedBackend>),
}

struct SharedBackend {
    registry: CageRegistry,
    /// Orders kept in `state.yaml` from local use; preserved untouched.
    local_orders: Vec<OrderRecord>,
    reconciler: SyncReconciler<JsonFileStore>,
    store: Arc<JsonFileStore>,
    runtime: tokio::runtime::Runtime,
}

impl Session {
    pub fn open() -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        Self::open_at(home)
    }

    pub fn open_at(home: PathBuf) -> Result<Self> {
        let config = load_config_at(&home).context("failed to load ~/.cagetrack/config.yaml")?;
        let mut state =
            open_state_at(&home, &config).context("failed to load ~/.cagetrack/state.yaml")?;

        let backend = match config.shared_store_at(&home) {
            None => {
                state.subscribe(|change| tracing::debug!(?change, "local state changed"));
                Backend::Local(state)
            }
            Some((store_path, collection)) => Backend::Shared(Box::new(SharedBackend::connect(
                state,
                &store_path,
                CollectionPath::from(collection),
                &config,
            )?)),
        };
        Ok(Self {
            home,
            config,
            backend,
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &CageRegistry {
        match &self.backend {
            Backend::Local(state) => state.registry(),
            Backend::Shared(shared) => &shared.registry,
        }
    }

    pub fn records(&self) -> Vec<OrderRecord> {
        match &self.backend {
            Backend::Local(state) => state.records().to_vec(),
            Backend::Shared(shared) => shared.runtime.block_on(shared.reconciler.records()),
        }
    }

    pub fn counts(&self) -> CageCounts {
        counts_by_cage(self.registry().cages(), &self.records())
    }

    pub fn orphaned_cages(&self) -> Vec<CageName> {
        orphaned_cages(self.registry().cages(), &self.records())
    }

    /// `--cage` if given (must be registered), else the first registry cage.
    pub fn select_cage(&self, requested: Option<&str>) -> Result<Option<CageName>> {
        match requested.map(str::trim) {
            Some(name) if !self.registry().contains(name) => Err(anyhow!(
                "cage '{name}' is not registered (see `cagetrack cage list`)"
            )),
            requested => Ok(self.registry().resolve_selection(requested)),
        }
    }

    // -----------------------------------------------------------------------
    // Order writes
    // -----------------------------------------------------------------------

    pub fn add_order(&mut self, raw_id: &str, cage: Option<CageName>) -> Result<OrderRecord> {
        let record = match &mut self.backend {
            Backend::Local(state) => state.add_order(raw_id, cage)?,
            Backend::Shared(shared) => {
                let record = shared
                    .runtime
                    .block_on(shared.reconciler.add_order(raw_id, cage))?;
                let (id, at) = (record.id.clone(), record.created_at);
                shared.settle("add order", move |v| v.contains(&id, &at));
                record
            }
        };
        self.save()?;
        Ok(record)
    }

    pub fn generate_bulk(&mut self, cage: &CageName, count: i64) -> Result<Vec<OrderRecord>> {
        let batch = match &mut self.backend {
            Backend::Local(state) => state.generate_bulk(cage, count)?,
            Backend::Shared(shared) => {
                let batch = shared
                    .runtime
                    .block_on(shared.reconciler.generate_bulk(cage, count))?;
                let keys: Vec<(OrderId, DateTime<Utc>)> =
                    batch.iter().map(|r| (r.id.clone(), r.created_at)).collect();
                shared.settle("bulk", move |v| {
                    keys.iter().all(|(id, at)| v.contains(id, at))
                });
                batch
            }
        };
        self.save()?;
        Ok(batch)
    }

    pub fn retire_cage(&mut self, cage: &str) -> Result<usize> {
        let retired = match &mut self.backend {
            Backend::Local(state) => state.retire_cage(cage)?,
            Backend::Shared(shared) => {
                let retired = shared
                    .runtime
                    .block_on(shared.reconciler.retire_cage(cage))?;
                let cage = cage.to_string();
                shared.settle("retire", move |v| {
                    !v.records().iter().any(|r| r.in_cage_named(&cage))
                });
                retired
            }
        };
        self.save()?;
        Ok(retired)
    }

    pub fn delete_order(&mut self, id: &OrderId, created_at: &DateTime<Utc>) -> Result<OrderRecord> {
        let removed = match &mut self.backend {
            Backend::Local(state) => state.delete_order(id, created_at)?,
            Backend::Shared(shared) => {
                let removed = shared
                    .runtime
                    .block_on(shared.reconciler.delete_order(id, created_at))?;
                let (id, at) = (id.clone(), *created_at);
                shared.settle("delete", move |v| !v.contains(&id, &at));
                removed
            }
        };
        self.save()?;
        Ok(removed)
    }

    pub fn reset_all(&mut self) -> Result<usize> {
        let removed = match &mut self.backend {
            Backend::Local(state) => state.reset_all()?,
            Backend::Shared(shared) => {
                let removed = shared.runtime.block_on(shared.reconciler.reset_all())?;
                shared.settle("reset all", |v| v.ledger().is_empty());
                removed
            }
        };
        self.save()?;
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Cage writes
    // -----------------------------------------------------------------------

    pub fn add_cage(&mut self, name: &str) -> Result<CageName> {
        let cage = match &mut self.backend {
            Backend::Local(state) => state.add_cage(name)?,
            Backend::Shared(shared) => shared.registry.add(name)?,
        };
        self.save()?;
        Ok(cage)
    }

    pub fn rename_cage(&mut self, old: &str, new: &str) -> Result<CageRename> {
        let rename = match &mut self.backend {
            Backend::Local(state) => state.rename_cage(old, new)?,
            Backend::Shared(shared) => {
                let SharedBackend {
                    registry,
                    reconciler,
                    runtime,
                    ..
                } = shared.as_mut();
                let rename = runtime.block_on(reconciler.rename_cage(registry, old, new))?;
                let from = rename.from.clone();
                shared.settle("rename", move |v| {
                    !v.records().iter().any(|r| r.cage.as_ref() == Some(&from))
                });
                rename
            }
        };
        self.save()?;
        Ok(rename)
    }

    /// Reset the registry. Returns the cages now orphaned by records.
    pub fn reset_cages(&mut self) -> Result<Vec<CageName>> {
        let orphaned = match &mut self.backend {
            Backend::Local(state) => state.reset_cages_to_default(),
            Backend::Shared(shared) => {
                shared.registry.reset_to_default();
                let records = shared.runtime.block_on(shared.reconciler.records());
                orphaned_cages(shared.registry.cages(), &records)
            }
        };
        self.save()?;
        Ok(orphaned)
    }

    // -----------------------------------------------------------------------
    // Shared-only
    // -----------------------------------------------------------------------

    /// Follow the store file and call `on_change` with fresh counts after
    /// every applied snapshot, until Ctrl-C.
    pub fn watch(&self, mut on_change: impl FnMut(u64, &CageCounts, Option<String>)) -> Result<()> {
        let Backend::Shared(shared) = &self.backend else {
            return Err(anyhow!(
                "`watch` needs the shared backend (set `backend: {{ kind: shared }}` in ~/.cagetrack/config.yaml)"
            ));
        };
        let registry = shared.registry.clone();
        shared.runtime.block_on(async {
            let _watch = shared
                .store
                .watch_file()
                .context("failed to watch the record store file")?;
            let mut generations = shared.reconciler.subscribe();
            loop {
                let view = shared.reconciler.view().await;
                let counts = counts_by_cage(registry.cages(), view.records());
                on_change(
                    view.generation(),
                    &counts,
                    view.last_error().map(ToString::to_string),
                );
                tokio::select! {
                    changed = generations.changed() => {
                        if changed.is_err() {
                            tracing::info!("store feed ended");
                            return Ok(());
                        }
                    }
                    _ = tokio::signal::ctrl_c() => return Ok(()),
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn save(&self) -> Result<()> {
        let snapshot = match &self.backend {
            Backend::Local(state) => state.snapshot(),
            Backend::Shared(shared) => StateSnapshot {
                version: STATE_VERSION,
                cages: shared.registry.cages().to_vec(),
                orders: shared.local_orders.clone(),
                saved_at: Utc::now(),
            },
        };
        save_state_at(&self.home, &snapshot).context("failed to save ~/.cagetrack/state.yaml")
    }
}

impl SharedBackend {
    fn connect(
        state: TrackerState,
        store_path: &Path,
        collection: CollectionPath,
        config: &TrackerConfig,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let store = Arc::new(
            JsonFileStore::open(store_path)
                .with_context(|| format!("failed to open record store {}", store_path.display()))?,
        );
        let policy = config.duplicate_policy;
        let reconciler = runtime.block_on(async {
            let reconciler =
                SyncReconciler::start(Arc::clone(&store), collection.clone(), policy).await?;
            reconciler.ready().await?;
            Ok::<_, cagetrack_sync::SyncError>(reconciler)
        })?;
        tracing::debug!(
            store = %store_path.display(),
            collection = %collection,
            "connected to shared record store"
        );

        Ok(Self {
            registry: state.registry().clone(),
            local_orders: state.records().to_vec(),
            reconciler,
            store,
            runtime,
        })
    }

    /// Wait for the feed to reflect a write. A timeout is logged, not fatal:
    /// the store accepted the write.
    fn settle(&self, operation: &str, pred: impl FnMut(&ReconciledView) -> bool) {
        let outcome = self.runtime.block_on(async {
            tokio::time::timeout(SETTLE_TIMEOUT, self.reconciler.wait_until(pred)).await
        });
        match outcome {
            Ok(Ok(generation)) => tracing::debug!(operation, generation, "write reconciled"),
            Ok(Err(err)) => tracing::warn!(operation, error = %err, "feed closed before write reconciled"),
            Err(_) => tracing::warn!(operation, "timed out waiting for the store feed"),
        }
    }
}
