//! Detection records: what a scan produces and what the store keeps

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A detection before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Detection time, RFC 3339 UTC with milliseconds.
    pub timestamp: String,
    pub source_url: String,
    pub key: String,
    pub value: String,
}

impl Detection {
    /// Stamp a detection with the current time.
    pub fn now(source_url: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { timestamp: iso_now(), source_url: source_url.into(), key: key.into(), value: value.into() }
    }
}

/// A persisted detection. Never mutated after the store creates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    pub id: u64,
    pub timestamp: String,
    pub source_url: String,
    pub key: String,
    pub value: String,
}

impl DetectionRecord {
    pub fn new(id: u64, detection: Detection) -> Self {
        let Detection { timestamp, source_url, key, value } = detection;
        Self { id, timestamp, source_url, key, value }
    }
}

/// Same shape as JavaScript's `Date.prototype.toISOString`.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
