//! Log backends
//!
//! - Memory: ephemeral, for tests and one-off runs
//! - File: JSON lines under the data root, one file per namespace

use crate::core::error::{DetectorError, DetectorResult};
use crate::core::record::{Detection, DetectionRecord};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const SCHEMA: &str = "webdetector/detections@v1";
pub const ENV_ROOT: &str = "WEBDETECTOR_ROOT";

/// First line of every log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaHeader {
    pub schema: String,
    pub key_path: String,
    pub auto_increment: bool,
}

impl SchemaHeader {
    pub fn current() -> Self {
        Self { schema: SCHEMA.to_string(), key_path: "id".to_string(), auto_increment: true }
    }
}

/// `$WEBDETECTOR_ROOT`, else `<data dir>/webdetector`.
pub fn default_root() -> DetectorResult<PathBuf> {
    if let Ok(root) = std::env::var(ENV_ROOT) {
        if !root.is_empty() {
            return Ok(PathBuf::from(root));
        }
    }
    dirs::data_dir()
        .map(|d| d.join("webdetector"))
        .ok_or_else(|| DetectorError::StorageUnavailable("no data directory for this user".into()))
}

pub fn log_path(root: &Path, namespace: &str) -> PathBuf {
    root.join(format!("{}.jsonl", namespace))
}

// =============================================================================
// MEMORY LOG
// =============================================================================

#[derive(Default)]
pub struct MemoryLog {
    records: Mutex<Vec<DetectionRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self { Self::default() }

    pub async fn append(&self, detection: Detection) -> DetectorResult<DetectionRecord> {
        let mut records = self.records.lock().await;
        let id = records.last().map_or(1, |r| r.id + 1);
        let record = DetectionRecord::new(id, detection);
        records.push(record.clone());
        Ok(record)
    }

    pub async fn list_all(&self) -> DetectorResult<Vec<DetectionRecord>> {
        Ok(self.records.lock().await.clone())
    }
}

// =============================================================================
// FILE LOG
// =============================================================================

struct Writer {
    file: File,
    next_id: u64,
}

pub struct FileLog {
    path: PathBuf,
    writer: Mutex<Writer>,
}

impl FileLog {
    /// Create the schema on first open; later opens only read.
    pub async fn open(path: PathBuf) -> DetectorResult<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(DetectorError::storage)?;
        }

        let (next_id, torn) = match fs::read_to_string(&path).await {
            Ok(contents) if !contents.trim().is_empty() => {
                check_header(&path, &contents)?;
                let next_id = parse_records(&path, &contents).iter().map(|r| r.id).max().map_or(1, |id| id + 1);
                (next_id, !contents.ends_with('\n'))
            }
            Ok(_) => {
                write_header(&path).await?;
                (1, false)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                write_header(&path).await?;
                (1, false)
            }
            Err(e) => return Err(DetectorError::storage(e)),
        };

        let mut file = OpenOptions::new().append(true).open(&path).await.map_err(DetectorError::storage)?;
        // A crash mid-append leaves a partial last line; terminate it so the next record starts clean.
        if torn {
            tracing::warn!(path = %path.display(), "terminating torn last line");
            file.write_all(b"\n").await.map_err(DetectorError::storage)?;
            file.flush().await.map_err(DetectorError::storage)?;
        }
        tracing::debug!(path = %path.display(), next_id, "detection log open");
        Ok(Self { path, writer: Mutex::new(Writer { file, next_id }) })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub async fn append(&self, detection: Detection) -> DetectorResult<DetectionRecord> {
        let mut w = self.writer.lock().await;
        let record = DetectionRecord::new(w.next_id, detection);
        let mut line = serde_json::to_string(&record).map_err(DetectorError::storage)?;
        line.push('\n');
        w.file.write_all(line.as_bytes()).await.map_err(DetectorError::storage)?;
        w.file.flush().await.map_err(DetectorError::storage)?;
        w.next_id += 1;
        Ok(record)
    }

    pub async fn list_all(&self) -> DetectorResult<Vec<DetectionRecord>> {
        // Hold the writer so a half-written line is never read.
        let _w = self.writer.lock().await;
        let contents = fs::read_to_string(&self.path).await.map_err(DetectorError::storage)?;
        Ok(parse_records(&self.path, &contents))
    }
}

async fn write_header(path: &Path) -> DetectorResult<()> {
    let mut line = serde_json::to_string(&SchemaHeader::current()).map_err(DetectorError::storage)?;
    line.push('\n');
    fs::write(path, line).await.map_err(DetectorError::storage)
}

fn check_header(path: &Path, contents: &str) -> DetectorResult<()> {
    let first = contents.lines().next().unwrap_or_default();
    match serde_json::from_str::<SchemaHeader>(first) {
        Ok(h) if h == SchemaHeader::current() => Ok(()),
        Ok(h) => Err(DetectorError::StorageUnavailable(format!(
            "{}: unsupported schema '{}'", path.display(), h.schema
        ))),
        Err(e) => Err(DetectorError::StorageUnavailable(format!(
            "{}: missing schema header ({})", path.display(), e
        ))),
    }
}

/// Records in file order; torn or foreign lines are skipped.
fn parse_records(path: &Path, contents: &str) -> Vec<DetectionRecord> {
    contents
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<DetectionRecord>(line) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = n + 1, error = %e, "skipping unreadable record");
                None
            }
        })
        .collect()
}

// =============================================================================
// BACKEND ENUM (no dyn traits)
// =============================================================================

pub enum LogBackend {
    Memory(MemoryLog),
    File(FileLog),
}

impl LogBackend {
    pub async fn append(&self, detection: Detection) -> DetectorResult<DetectionRecord> {
        match self {
            LogBackend::Memory(log) => log.append(detection).await,
            LogBackend::File(log) => log.append(detection).await,
        }
    }

    pub async fn list_all(&self) -> DetectorResult<Vec<DetectionRecord>> {
        match self {
            LogBackend::Memory(log) => log.list_all().await,
            LogBackend::File(log) => log.list_all().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn detection(value: &str) -> Detection {
        Detection::now("file:///page.html", "access_token", value)
    }

    #[tokio::test]
    async fn test_memory_ids_increase() {
        let log = MemoryLog::new();
        let a = log.append(detection("a")).await.unwrap();
        let b = log.append(detection("b")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(log.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_file_creates_header_once() {
        let dir = TempDir::new().unwrap();
        let path = log_path(dir.path(), "ns");
        let log = FileLog::open(path.clone()).await.unwrap();
        log.append(detection("a")).await.unwrap();
        drop(log);

        let before = std::fs::read_to_string(&path).unwrap();
        assert!(before.starts_with(r#"{"schema":"webdetector/detections@v1","keyPath":"id","autoIncrement":true}"#));

        let log = FileLog::open(path.clone()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        let next = log.append(detection("b")).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn test_file_rejects_foreign_schema() {
        let dir = TempDir::new().unwrap();
        let path = log_path(dir.path(), "ns");
        std::fs::write(&path, "{\"schema\":\"other@v9\",\"keyPath\":\"id\",\"autoIncrement\":true}\n").unwrap();
        let err = FileLog::open(path.clone()).await.err().unwrap();
        assert!(matches!(err, DetectorError::StorageUnavailable(_)));

        std::fs::write(&path, "not json\n").unwrap();
        assert!(FileLog::open(path).await.is_err());
    }

    #[tokio::test]
    async fn test_file_skips_torn_lines() {
        let dir = TempDir::new().unwrap();
        let path = log_path(dir.path(), "ns");
        let log = FileLog::open(path.clone()).await.unwrap();
        log.append(detection("a")).await.unwrap();
        drop(log);
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("{\"id\":2,\"timest\n");
        std::fs::write(&path, contents).unwrap();

        let log = FileLog::open(path).await.unwrap();
        let records = log.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(log.append(detection("c")).await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_file_recovers_unterminated_tail() {
        let dir = TempDir::new().unwrap();
        let path = log_path(dir.path(), "ns");
        let log = FileLog::open(path.clone()).await.unwrap();
        log.append(detection("a")).await.unwrap();
        drop(log);
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("{\"id\":2,\"timest");
        std::fs::write(&path, contents).unwrap();

        let log = FileLog::open(path.clone()).await.unwrap();
        let appended = log.append(detection("after_crash")).await.unwrap();
        assert_eq!(appended.id, 2);

        let values: Vec<_> = log.list_all().await.unwrap().into_iter().map(|r| (r.id, r.value)).collect();
        assert_eq!(values, [(1, "a".to_string()), (2, "after_crash".to_string())]);
        assert!(std::fs::read_to_string(&path).unwrap().ends_with('\n'));
    }
}
