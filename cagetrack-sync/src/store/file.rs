//! Record store backed by a single JSON file.
//!
//! Several operators can point at the same file (for example on a network
//! share). Each write holds an exclusive lock on `<file>.lock`, re-reads the
//! file, applies its change, and writes the whole table back with the
//! `.tmp` + rename pattern, so writers never drop each other's documents.
//! Changes made by other processes are picked up by
//! [`JsonFileStore::reload`], which [`JsonFileStore::watch_file`] drives from
//! filesystem notifications.
//!
//! ```json
//! {
//!   "version": 1,
//!   "saved_at": "2024-05-01T10:00:00Z",
//!   "collections": { "cagetrack/orders": { "<key>": { "id": "...", ... } } }
//! }
//! ```

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use futures::StreamExt;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use super::{DocumentTable, RecordStore, SnapshotStream};
use crate::document::{CollectionPath, DocumentFields, DocumentKey};
use crate::error::{io_err, StoreError};

/// Current store file schema version.
pub const STORE_FILE_VERSION: u32 = 1;

/// Quiet period after a filesystem event before the file is re-read.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    collections: DocumentTable,
}

#[derive(Debug)]
struct FileInner {
    path: PathBuf,
    table: Mutex<DocumentTable>,
    revision: watch::Sender<u64>,
}

/// Shared JSON file store. Cloning shares the same table and feed.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    inner: Arc<FileInner>,
}

fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::unavailable("lock poisoned")
}

fn join_err(err: tokio::task::JoinError) -> StoreError {
    StoreError::unavailable(format!("store task join error: {err}"))
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store; it is
    /// created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = read_table(&path)?;
        let (revision, _) = watch::channel(0);
        Ok(Self {
            inner: Arc::new(FileInner {
                path,
                table: Mutex::new(table),
                revision,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Re-read the file and notify observers if its content changed.
    ///
    /// Returns whether anything changed.
    pub fn reload(&self) -> Result<bool, StoreError> {
        self.inner.reload()
    }

    /// Watch the store file's directory and reload after external changes.
    ///
    /// Must be called from within a Tokio runtime. Watching stops when the
    /// returned handle is dropped.
    pub fn watch_file(&self) -> Result<FileWatch, StoreError> {
        let path = &self.inner.path;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })
        .map_err(notify_err)?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(notify_err)?;

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "store watcher event error");
                        continue;
                    }
                };
                if !is_relevant(&event, &inner.path) {
                    continue;
                }

                // Coalesce a burst of events (tmp write + rename) into one reload.
                tokio::time::sleep(RELOAD_DEBOUNCE).await;
                while event_rx.try_recv().is_ok() {}

                let worker = Arc::clone(&inner);
                match tokio::task::spawn_blocking(move || worker.reload()).await {
                    Ok(Ok(true)) => {
                        tracing::debug!(path = %inner.path.display(), "store file reloaded");
                    }
                    Ok(Ok(false)) => {}
                    Ok(Err(err)) => {
                        tracing::warn!(path = %inner.path.display(), error = %err, "store file reload failed");
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "store reload task join error");
                    }
                }
            }
        });

        Ok(FileWatch {
            _watcher: watcher,
            task,
        })
    }

    async fn commit<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut DocumentTable) -> Result<T, StoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.commit(op))
            .await
            .map_err(join_err)?
    }
}

/// Handle keeping a [`JsonFileStore::watch_file`] watcher alive.
pub struct FileWatch {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for FileWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl FileInner {
    fn commit<T>(
        &self,
        op: impl FnOnce(&mut DocumentTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let lock = lock_store_file(&self.path)?;
        let out = {
            let mut table = self.table.lock().map_err(poison_err)?;
            let mut next = read_table(&self.path)?;
            let out = op(&mut next)?;
            write_table(&self.path, &next)?;
            *table = next;
            out
        };
        FileExt::unlock(&lock).map_err(|e| io_err(&lock_path(&self.path), e))?;
        self.revision.send_modify(|rev| *rev += 1);
        Ok(out)
    }

    fn reload(&self) -> Result<bool, StoreError> {
        let loaded = read_table(&self.path)?;
        {
            let mut table = self.table.lock().map_err(poison_err)?;
            if *table == loaded {
                return Ok(false);
            }
            *table = loaded;
        }
        self.revision.send_modify(|rev| *rev += 1);
        Ok(true)
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn observe(&self, collection: &CollectionPath) -> Result<SnapshotStream, StoreError> {
        let inner = Arc::clone(&self.inner);
        let collection = collection.clone();
        let stream = WatchStream::new(self.inner.revision.subscribe()).map(move |_| {
            inner
                .table
                .lock()
                .map(|table| table.snapshot(&collection))
                .map_err(poison_err)
        });
        Ok(stream.boxed())
    }

    async fn insert(
        &self,
        collection: &CollectionPath,
        fields: DocumentFields,
    ) -> Result<DocumentKey, StoreError> {
        let collection = collection.clone();
        self.commit(move |table| Ok(table.insert(&collection, fields)))
            .await
    }

    async fn update_fields(
        &self,
        collection: &CollectionPath,
        key: &DocumentKey,
        fields: DocumentFields,
    ) -> Result<(), StoreError> {
        let collection = collection.clone();
        let key = key.clone();
        self.commit(move |table| table.update_fields(&collection, &key, fields))
            .await
    }

    async fn delete(&self, collection: &CollectionPath, key: &DocumentKey) -> Result<(), StoreError> {
        let collection = collection.clone();
        let key = key.clone();
        self.commit(move |table| table.delete(&collection, &key)).await
    }

    async fn delete_all(&self, collection: &CollectionPath) -> Result<usize, StoreError> {
        let collection = collection.clone();
        self.commit(move |table| Ok(table.delete_all(&collection)))
            .await
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn read_table(path: &Path) -> Result<DocumentTable, StoreError> {
    if !path.exists() {
        return Ok(DocumentTable::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(DocumentTable::default());
    }
    let file: StoreFile = serde_json::from_str(&contents)
        .map_err(|e| StoreError::malformed(format!("{}: {e}", path.display())))?;
    Ok(file.collections)
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive cross-process lock on `<path>.lock`; blocks while another
/// writer holds it. Released on `unlock` or when the handle is closed.
fn lock_store_file(path: &Path) -> Result<File, StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let lock_path = lock_path(path);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| io_err(&lock_path, e))?;
    file.lock_exclusive().map_err(|e| io_err(&lock_path, e))?;
    Ok(file)
}

/// Writes to `<path>.tmp` then renames to `<path>`.
fn write_table(path: &Path, table: &DocumentTable) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let file = StoreFile {
        version: STORE_FILE_VERSION,
        saved_at: Utc::now(),
        collections: table.clone(),
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| StoreError::malformed(format!("serialize store: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

fn is_relevant(event: &Event, store_path: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == store_path.file_name())
}

fn notify_err(err: notify::Error) -> StoreError {
    StoreError::unavailable(format!("file watcher: {err}"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
