//! Native documents: an in-memory buffer and a polled file.

use super::Document;
use crate::core::error::{DetectorError, DetectorResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

// =============================================================================
// LIVE DOCUMENT
// =============================================================================

/// Markup held in memory and mutated by the embedder. Every mutation is a change.
pub struct LiveDocument {
    url: String,
    text: RwLock<String>,
    generation: watch::Sender<u64>,
}

impl LiveDocument {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        let (generation, _) = watch::channel(0);
        Self { url: url.into(), text: RwLock::new(text.into()), generation }
    }

    pub fn mutate(&self, f: impl FnOnce(&mut String)) {
        {
            let mut text = self.text.write().unwrap_or_else(|p| p.into_inner());
            f(&mut text);
        }
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    pub fn append(&self, fragment: &str) { self.mutate(|t| t.push_str(fragment)) }

    pub fn replace(&self, text: impl Into<String>) {
        let text = text.into();
        self.mutate(|t| *t = text)
    }

    pub fn text(&self) -> String { self.text.read().unwrap_or_else(|p| p.into_inner()).clone() }
}

#[async_trait]
impl Document for LiveDocument {
    fn url(&self) -> String { self.url.clone() }

    async fn markup(&self) -> DetectorResult<String> { Ok(self.text()) }

    fn changes(&self) -> watch::Receiver<u64> { self.generation.subscribe() }
}

// =============================================================================
// FILE DOCUMENT
// =============================================================================

type Fingerprint = Option<(u64, Option<SystemTime>)>;

/// A markup file on disk. A poller bumps the generation when length or mtime change.
pub struct FileDocument {
    path: PathBuf,
    url: String,
    generation: watch::Receiver<u64>,
    poller: AbortHandle,
}

impl FileDocument {
    /// Start polling `path`. Must be called inside a tokio runtime.
    pub fn open(path: impl Into<PathBuf>, url: Option<String>, poll: Duration) -> Self {
        let path = path.into();
        let url = url.unwrap_or_else(|| file_url(&path));
        let (tx, generation) = watch::channel(0u64);

        let watched = path.clone();
        let poller = tokio::spawn(async move {
            let mut last = fingerprint(&watched).await;
            let mut ticker = tokio::time::interval(poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = fingerprint(&watched).await;
                if now != last {
                    last = now;
                    tracing::debug!(path = %watched.display(), "file changed");
                    tx.send_modify(|g| *g = g.wrapping_add(1));
                }
            }
        })
        .abort_handle();

        Self { path, url, generation, poller }
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl Drop for FileDocument {
    fn drop(&mut self) { self.poller.abort() }
}

#[async_trait]
impl Document for FileDocument {
    fn url(&self) -> String { self.url.clone() }

    async fn markup(&self) -> DetectorResult<String> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| DetectorError::ExtractionFault(format!("{}: {}", self.path.display(), e)))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn changes(&self) -> watch::Receiver<u64> { self.generation.clone() }
}

async fn fingerprint(path: &Path) -> Fingerprint {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some((meta.len(), meta.modified().ok()))
}

fn file_url(path: &Path) -> String {
    let abs = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", abs.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_live_document_mutations() {
        let doc = LiveDocument::new("mem://p", "<p>");
        let mut rx = doc.changes();
        doc.append("</p>");
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        doc.replace("x");
        assert_eq!(doc.markup().await.unwrap(), "x");
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_file_document_reports_growth() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<html></html>").unwrap();

        let doc = FileDocument::open(&path, None, Duration::from_millis(20));
        assert!(doc.url().starts_with("file://"));
        let mut rx = doc.changes();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!rx.has_changed().unwrap());

        std::fs::write(&path, "<html>access_token=abc</html>").unwrap();
        tokio::time::timeout(Duration::from_secs(2), rx.changed()).await.unwrap().unwrap();
        assert!(doc.markup().await.unwrap().contains("access_token=abc"));
    }

    #[tokio::test]
    async fn test_missing_file_is_extraction_fault() {
        let doc = FileDocument::open("/nonexistent/webdetector/page.html", Some("https://x.test/".into()), Duration::from_millis(50));
        assert_eq!(doc.url(), "https://x.test/");
        assert!(matches!(doc.markup().await, Err(DetectorError::ExtractionFault(_))));
    }
}
