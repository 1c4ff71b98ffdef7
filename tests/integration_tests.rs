//! Integration Tests: detector end to end
//!
//! These tests verify:
//! 1. First scan of a page and a later mutation produce independent records
//!    (values end at whitespace or a quote, so trailing markup is kept)
//! 2. A token that cannot compile leaves the others working
//! 3. File-backed ids stay monotonic across reopen
//! 4. A log with a foreign schema refuses to open
//! 5. Watched files and debounced rescans
//! 6. Configuration layering with the environment

use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use webdetector::core::config::{ENV_NAMESPACE, ENV_PATTERNS};
use webdetector::store::ENV_ROOT;
use webdetector::{
    render_text, Detection, DetectionStore, Detector, DetectorConfig, DetectorError, FileDocument, LiveDocument,
    PatternSet, ScanState,
};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

const SCRIPT_PAGE: &str = r#"<html><head><script>var cfg = {"access_token": "abc123"};</script></head><body></body></html>"#;

fn access_token_detector(dir: &TempDir, namespace: &str) -> Detector {
    let config = DetectorConfig::new().with_patterns(PatternSet::new(["access_token"]));
    Detector::new(config, DetectionStore::file(namespace, dir.path())).expect("detector")
}

async fn settle(detector: &Detector, wait: Duration) {
    tokio::time::sleep(wait).await;
    detector.flush().await;
}

/// Test: script literal match, then a mutation adds a second record
#[tokio::test]
async fn script_literal_then_mutation() {
    let dir = TempDir::new().expect("tempdir");
    let detector = access_token_detector(&dir, "scenario");
    let page = Arc::new(LiveDocument::new("https://app.test/login", SCRIPT_PAGE));

    let (first, handle) = detector.start(page.clone()).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first.detections[0].key, "access_token");
    assert_eq!(first.detections[0].value, "abc123");
    assert_eq!(detector.state(), ScanState::Idle);

    detector.flush().await;
    let before = detector.list_detections().await.expect("list");
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].value, "abc123");
    assert_eq!(before[0].source_url, "https://app.test/login");
    assert!(!before[0].timestamp.is_empty());

    page.append(" access_token=xyz789 ");
    settle(&detector, Duration::from_millis(150)).await;

    // The rescan sees the whole page again: abc123 once more, then xyz789.
    let after = detector.list_detections().await.expect("list");
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[0]);
    let injected: Vec<_> = after.iter().filter(|r| r.value == "xyz789").collect();
    assert_eq!(injected.len(), 1);
    assert_eq!(injected[0].key, "access_token");
    assert_eq!(injected[0].source_url, "https://app.test/login");
    assert!(after.windows(2).all(|w| w[0].id < w[1].id));

    let text = render_text(&after);
    assert!(text.starts_with("Detected Logs"));
    assert!(text.contains("access_token: xyz789"));

    handle.dispose();
    handle.dispose();
    assert!(handle.is_disposed());
}

/// Test: a value runs up to the next quote or whitespace, so adjacent markup is captured
#[tokio::test]
async fn value_keeps_trailing_markup() {
    let dir = TempDir::new().expect("tempdir");
    let detector = access_token_detector(&dir, "recall");
    detector.open().await.expect("open");

    let page = LiveDocument::new("https://app.test/", "<div>access_token=xyz789</div>");
    let report = detector.scan_once(&page).await;

    assert_eq!(report.len(), 1);
    assert_eq!(report.detections[0].value, "xyz789</div>");
}

/// Test: empty token is skipped, tokens with regex syntax match literally
#[tokio::test]
async fn malformed_token_does_not_stop_others() {
    let dir = TempDir::new().expect("tempdir");
    let config = DetectorConfig::new().with_patterns(PatternSet::new(["", "a(b", "client_secret"]));
    let detector = Detector::new(config, DetectionStore::file("isolation", dir.path())).expect("detector");
    detector.open().await.expect("open");

    let page = LiveDocument::new("https://app.test/", r#"client_secret: "s3cr3t" a(b=1"#);
    let report = detector.scan_once(&page).await;

    let pairs: Vec<_> = report.detections.iter().map(|d| (d.key.as_str(), d.value.as_str())).collect();
    assert_eq!(pairs.len(), 2);
    assert!(pairs.contains(&("client_secret", "s3cr3t")));
    assert!(pairs.contains(&("a(b", "1")));
}

/// Test: ids continue after a second store opens the same log
#[tokio::test]
async fn ids_survive_reopen() {
    let _guard = lock_env();
    let dir = TempDir::new().expect("tempdir");
    std::env::set_var(ENV_ROOT, dir.path());

    let first = DetectionStore::at_default_root("reopen").expect("store");
    first.open().await.expect("open");
    first.append(Detection::now("u", "access_token", "one"));
    first.append(Detection::now("u", "access_token", "two"));
    first.flush().await;

    let second = DetectionStore::at_default_root("reopen").expect("store");
    second.open().await.expect("reopen");
    assert_eq!(second.list_all().await.expect("list").len(), 2);
    second.append(Detection::now("u", "access_token", "three"));
    second.flush().await;

    let ids: Vec<u64> = second.list_all().await.expect("list").iter().map(|r| r.id).collect();
    assert_eq!(ids, [1, 2, 3]);
    assert!(dir.path().join("reopen.jsonl").is_file());

    std::env::remove_var(ENV_ROOT);
}

/// Test: foreign schema header makes the store unavailable, scanning still works
#[tokio::test]
async fn foreign_schema_is_unavailable() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(
        dir.path().join("foreign.jsonl"),
        "{\"schema\":\"someone-else@v9\",\"keyPath\":\"id\",\"autoIncrement\":true}\n",
    )
    .expect("write");

    let detector = access_token_detector(&dir, "foreign");
    assert!(matches!(detector.open().await, Err(DetectorError::StorageUnavailable(_))));

    let page = Arc::new(LiveDocument::new("https://app.test/", SCRIPT_PAGE));
    let (report, _handle) = detector.start(page).await;
    assert_eq!(report.len(), 1);
    assert!(matches!(detector.list_detections().await, Err(DetectorError::StorageUnavailable(_))));
}

/// Test: a watched file is rescanned after it changes on disk
#[tokio::test]
async fn watched_file_rescans() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("page.html");
    std::fs::write(&path, "<html></html>").expect("write");

    let detector = access_token_detector(&dir, "watched");
    let doc = Arc::new(FileDocument::open(&path, Some("https://saved.test/".into()), Duration::from_millis(20)));

    let (first, handle) = detector.start(doc).await;
    assert!(first.is_empty());

    std::fs::write(&path, "<html></html>\naccess_token=fromdisk\n").expect("write");
    settle(&detector, Duration::from_millis(300)).await;

    let records = detector.list_detections().await.expect("list");
    // A poll may land between truncate and write, so there can be more than one rescan.
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.value == "fromdisk" && r.source_url == "https://saved.test/"));
    handle.dispose();
}

/// Test: changes inside one debounce window cause a single rescan
#[tokio::test]
async fn debounced_rescan_runs_once() {
    let dir = TempDir::new().expect("tempdir");
    let config = DetectorConfig::new()
        .with_patterns(PatternSet::new(["access_token"]))
        .with_debounce_ms(100);
    let detector = Detector::new(config, DetectionStore::file("debounce", dir.path())).expect("detector");
    let page = Arc::new(LiveDocument::new("https://app.test/", ""));

    let (first, _handle) = detector.start(page.clone()).await;
    assert!(first.is_empty());

    page.append(" access_token=a");
    tokio::time::sleep(Duration::from_millis(20)).await;
    page.append(" access_token=b");
    tokio::time::sleep(Duration::from_millis(20)).await;
    page.append(" access_token=c");
    settle(&detector, Duration::from_millis(300)).await;

    let values: Vec<_> = detector.list_detections().await.expect("list").into_iter().map(|r| r.value).collect();
    assert_eq!(values, ["a", "b", "c"]);
}

/// Test: JSON config, then environment on top
#[test]
fn env_overrides_config_file() {
    let _guard = lock_env();
    std::env::set_var(ENV_PATTERNS, "foo, bar");
    std::env::set_var(ENV_NAMESPACE, "EnvNs");

    let config = DetectorConfig::from_json(r#"{"patterns":["x"],"debounceMs":50}"#)
        .expect("config")
        .apply_env();

    std::env::remove_var(ENV_PATTERNS);
    std::env::remove_var(ENV_NAMESPACE);

    assert_eq!(config.patterns.tokens(), ["foo", "bar"]);
    assert_eq!(config.storage_namespace, "EnvNs");
    assert_eq!(config.debounce_ms, Some(50));
    assert_eq!(config.poll_interval_ms, 500);
}
