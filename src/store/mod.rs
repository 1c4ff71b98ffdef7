//! DetectionStore: append-only detection log behind a lazily opened handle.
//!
//! ```text
//! append() ──► channel ──► writer task ──► LogBackend (Memory | File)
//! list_all() ─────────────────────────────►   "
//! ```
//!
//! Until [`DetectionStore::open`] completes, appends are dropped and
//! `list_all` fails with `StorageUnavailable`. One writer task per open
//! store keeps appends in issue order.

mod log;

pub use log::{default_root, log_path, FileLog, LogBackend, MemoryLog, SchemaHeader, ENV_ROOT, SCHEMA};

use crate::core::config::validate_namespace;
use crate::core::coordinator::DetectionSink;
use crate::core::error::{DetectorError, DetectorResult};
use crate::core::record::{Detection, DetectionRecord};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, OnceCell};

/// Where an opened store keeps its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    /// `<root>/<namespace>.jsonl`
    File { root: PathBuf },
}

enum Command {
    Append(Detection),
    Flush(oneshot::Sender<()>),
}

struct OpenStore {
    backend: Arc<LogBackend>,
    tx: mpsc::UnboundedSender<Command>,
}

struct Inner {
    namespace: String,
    kind: StoreKind,
    open: OnceCell<OpenStore>,
}

/// Cheap to clone; all clones share one handle.
#[derive(Clone)]
pub struct DetectionStore {
    inner: Arc<Inner>,
}

impl DetectionStore {
    pub fn new(namespace: impl Into<String>, kind: StoreKind) -> Self {
        Self { inner: Arc::new(Inner { namespace: namespace.into(), kind, open: OnceCell::new() }) }
    }

    pub fn memory(namespace: impl Into<String>) -> Self { Self::new(namespace, StoreKind::Memory) }

    pub fn file(namespace: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::new(namespace, StoreKind::File { root: root.into() })
    }

    /// File store under [`default_root`].
    pub fn at_default_root(namespace: impl Into<String>) -> DetectorResult<Self> {
        Ok(Self::file(namespace, default_root()?))
    }

    pub fn namespace(&self) -> &str { &self.inner.namespace }
    pub fn kind(&self) -> &StoreKind { &self.inner.kind }
    pub fn is_open(&self) -> bool { self.inner.open.initialized() }

    /// Open once; later calls reuse the handle. Never alters existing records.
    pub async fn open(&self) -> DetectorResult<()> {
        self.inner
            .open
            .get_or_try_init(|| async {
                validate_namespace(&self.inner.namespace)
                    .map_err(|e| DetectorError::StorageUnavailable(e.to_string()))?;
                let backend = match &self.inner.kind {
                    StoreKind::Memory => LogBackend::Memory(MemoryLog::new()),
                    StoreKind::File { root } => {
                        LogBackend::File(FileLog::open(log_path(root, &self.inner.namespace)).await?)
                    }
                };
                let backend = Arc::new(backend);
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_writer(backend.clone(), rx));
                tracing::info!(namespace = %self.inner.namespace, "detection store open");
                Ok::<_, DetectorError>(OpenStore { backend, tx })
            })
            .await
            .map(|_| ())
    }

    /// Fire-and-forget. Dropped without error if the store is not open.
    pub fn append(&self, detection: Detection) {
        match self.inner.open.get() {
            Some(open) => {
                if open.tx.send(Command::Append(detection)).is_err() {
                    tracing::debug!("detection store writer gone, detection dropped");
                }
            }
            None => tracing::debug!(key = %detection.key, "detection store not open, detection dropped"),
        }
    }

    /// All records in insertion order.
    pub async fn list_all(&self) -> DetectorResult<Vec<DetectionRecord>> {
        let open = self
            .inner
            .open
            .get()
            .ok_or_else(|| DetectorError::StorageUnavailable("store not open".into()))?;
        open.backend.list_all().await
    }

    /// Wait until every append issued before this call has been committed or dropped.
    pub async fn flush(&self) {
        if let Some(open) = self.inner.open.get() {
            let (done, wait) = oneshot::channel();
            if open.tx.send(Command::Flush(done)).is_ok() {
                let _ = wait.await;
            }
        }
    }
}

impl DetectionSink for DetectionStore {
    fn append(&self, detection: Detection) { DetectionStore::append(self, detection) }
}

async fn run_writer(backend: Arc<LogBackend>, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Append(detection) => {
                if let Err(e) = backend.append(detection).await {
                    tracing::debug!(error = %e, "append failed, detection dropped");
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unopened_store() {
        let store = DetectionStore::memory("t");
        store.append(Detection::now("u", "access_token", "early"));
        assert!(matches!(store.list_all().await, Err(DetectorError::StorageUnavailable(_))));

        store.open().await.unwrap();
        store.flush().await;
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_then_list() {
        let store = DetectionStore::memory("t");
        store.open().await.unwrap();
        store.open().await.unwrap();
        for v in ["a", "b", "c"] {
            store.append(Detection::now("u", "access_token", v));
        }
        store.flush().await;
        let records = store.list_all().await.unwrap();
        let values: Vec<_> = records.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, ["a", "b", "c"]);
        assert!(records.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_bad_namespace_is_unavailable() {
        let store = DetectionStore::memory("../x");
        assert!(matches!(store.open().await, Err(DetectorError::StorageUnavailable(_))));
        assert!(!store.is_open());
    }
}
