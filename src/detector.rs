//! Detector: the process-wide context for native hosts.
//!
//! Lifecycle: build from config, `open` the store (or let `start` try),
//! `start` on a document to scan once and keep rescanning on change,
//! `dispose` the returned handle (or drop it) when the document goes away.

use crate::core::config::DetectorConfig;
use crate::core::coordinator::{ScanCoordinator, ScanReport, ScanState};
use crate::core::error::DetectorResult;
use crate::core::overlay::OverlayState;
use crate::core::record::DetectionRecord;
use crate::store::DetectionStore;
use crate::watch::{Document, MutationWatcher, WatchHandle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Detector {
    config: DetectorConfig,
    store: DetectionStore,
    coordinator: Arc<ScanCoordinator<DetectionStore>>,
    watcher: MutationWatcher,
    overlay: Mutex<OverlayState>,
}

impl Detector {
    /// Compile patterns and bind to `store`. Tokens that fail to compile are skipped.
    pub fn new(config: DetectorConfig, store: DetectionStore) -> DetectorResult<Self> {
        config.validate()?;
        let patterns = config.patterns.compile();
        for skipped in patterns.skipped() {
            warn!("{}", skipped);
        }
        let mut watcher = MutationWatcher::new();
        if let Some(ms) = config.debounce_ms {
            watcher = watcher.with_debounce(Duration::from_millis(ms));
        }
        Ok(Self {
            coordinator: Arc::new(ScanCoordinator::new(patterns, store.clone())),
            config,
            store,
            watcher,
            overlay: Mutex::new(OverlayState::default()),
        })
    }

    /// File-backed store for the configured namespace under the default data root.
    pub fn from_config(config: DetectorConfig) -> DetectorResult<Self> {
        let store = DetectionStore::at_default_root(config.storage_namespace.clone())?;
        Self::new(config, store)
    }

    pub fn config(&self) -> &DetectorConfig { &self.config }
    pub fn store(&self) -> &DetectionStore { &self.store }
    pub fn state(&self) -> ScanState { self.coordinator.state() }

    pub async fn open(&self) -> DetectorResult<()> { self.store.open().await }

    /// One scan of the current document text. Never fails; faults are logged.
    pub async fn scan_once(&self, doc: &dyn Document) -> ScanReport {
        scan_document(&self.coordinator, doc).await
    }

    /// Rescan `doc` on every change batch. Each rescan is its own task.
    pub fn watch<D: Document + 'static>(&self, doc: Arc<D>) -> WatchHandle {
        let coordinator = self.coordinator.clone();
        let target = doc.clone();
        self.watcher.observe(&*doc, move || {
            let coordinator = coordinator.clone();
            let target = target.clone();
            tokio::spawn(async move {
                scan_document(&coordinator, &*target).await;
            });
        })
    }

    /// Open (a failure only means detections are not recorded), scan once, then watch.
    pub async fn start<D: Document + 'static>(&self, doc: Arc<D>) -> (ScanReport, WatchHandle) {
        if let Err(e) = self.open().await {
            warn!(error = %e, "detections will not be recorded");
        }
        let handle = self.watch(doc.clone());
        let report = self.scan_once(&*doc).await;
        (report, handle)
    }

    /// What the overlay renders.
    pub async fn list_detections(&self) -> DetectorResult<Vec<DetectionRecord>> {
        self.store.list_all().await
    }

    pub async fn flush(&self) { self.store.flush().await }

    pub fn overlay(&self) -> OverlayState { *self.lock_overlay() }
    pub fn toggle_overlay(&self) -> bool { self.lock_overlay().toggle() }
    pub fn increase_font(&self) -> u32 { self.lock_overlay().increase_font() }
    pub fn decrease_font(&self) -> u32 { self.lock_overlay().decrease_font() }

    fn lock_overlay(&self) -> std::sync::MutexGuard<'_, OverlayState> {
        self.overlay.lock().unwrap_or_else(|p| p.into_inner())
    }
}

async fn scan_document(coordinator: &ScanCoordinator<DetectionStore>, doc: &dyn Document) -> ScanReport {
    let _scan = coordinator.enter();
    let url = doc.url();
    let text = match doc.markup().await {
        Ok(text) => text,
        Err(e) => {
            warn!(url = %url, error = %e, "scan skipped");
            return ScanReport::default();
        }
    };
    let report = coordinator.forward_matches(&url, &text);
    for d in &report.detections {
        info!(url = %d.source_url, "Match found: {} = {}", d.key, d.value);
    }
    debug!(url = %url, matches = report.len(), "scan complete");
    report
}
