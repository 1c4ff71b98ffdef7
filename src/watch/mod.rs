//! MutationWatcher for native documents.
//!
//! A [`Document`] publishes a change generation on a `tokio::sync::watch`
//! channel. Bumps that land before the watcher wakes collapse into one
//! batch, and each batch invokes the callback exactly once.

mod document;

pub use document::{FileDocument, LiveDocument};

use crate::core::error::DetectorResult;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Something that can be scanned and reports when it changes.
#[async_trait]
pub trait Document: Send + Sync {
    /// Source URL stamped on detections.
    fn url(&self) -> String;

    /// Full markup as text, read on demand.
    async fn markup(&self) -> DetectorResult<String>;

    /// Change generation. The value is opaque; only changes matter.
    fn changes(&self) -> watch::Receiver<u64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MutationWatcher {
    debounce: Option<Duration>,
}

impl MutationWatcher {
    pub fn new() -> Self { Self::default() }

    /// Wait this long after a batch arrives and fold later changes into it.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    pub fn debounce(&self) -> Option<Duration> { self.debounce }

    /// Subscribe to `root`; `on_change` runs once per batch until the handle is disposed.
    /// Must be called inside a tokio runtime.
    pub fn observe<D, F>(&self, root: &D, on_change: F) -> WatchHandle
    where
        D: Document + ?Sized,
        F: Fn() + Send + Sync + 'static,
    {
        let mut rx = root.changes();
        rx.borrow_and_update();
        let disposed = Arc::new(AtomicBool::new(false));
        let stopped = disposed.clone();
        let debounce = self.debounce;

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if let Some(window) = debounce {
                    tokio::time::sleep(window).await;
                }
                rx.borrow_and_update();
                if stopped.load(Ordering::Acquire) {
                    break;
                }
                on_change();
            }
            tracing::debug!("mutation watcher stopped");
        });

        WatchHandle { abort: task.abort_handle(), disposed }
    }
}

/// Subscription handle. Disposal is synchronous and idempotent; dropping disposes.
#[derive(Debug)]
pub struct WatchHandle {
    abort: AbortHandle,
    disposed: Arc<AtomicBool>,
}

impl WatchHandle {
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.abort.abort();
        }
    }

    pub fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

impl Drop for WatchHandle {
    fn drop(&mut self) { self.dispose() }
}
