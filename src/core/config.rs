//! Detector configuration - passed from higher layers

use crate::core::error::{DetectorError, DetectorResult};
use crate::core::pattern::PatternSet;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "WebDetectorDB";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

pub const ENV_PATTERNS: &str = "WEBDETECTOR_PATTERNS";
pub const ENV_NAMESPACE: &str = "WEBDETECTOR_NAMESPACE";

/// Detector configuration. Higher layers construct this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectorConfig {
    pub patterns: PatternSet,
    /// Isolates one store instance per logical namespace.
    pub storage_namespace: String,
    /// Coalesce window for change batches. `None` rescans on every batch.
    pub debounce_ms: Option<u64>,
    /// File polling period for native documents.
    pub poll_interval_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            patterns: PatternSet::default(),
            storage_namespace: DEFAULT_NAMESPACE.to_string(),
            debounce_ms: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_patterns(mut self, patterns: PatternSet) -> Self { self.patterns = patterns; self }
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self { self.storage_namespace = ns.into(); self }
    pub fn with_debounce_ms(mut self, ms: u64) -> Self { self.debounce_ms = Some(ms); self }
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self { self.poll_interval_ms = ms; self }

    pub fn from_json(json: &str) -> DetectorResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| DetectorError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `WEBDETECTOR_PATTERNS` and `WEBDETECTOR_NAMESPACE` when set and non-empty.
    pub fn apply_env(mut self) -> Self {
        if let Ok(list) = std::env::var(ENV_PATTERNS) {
            let set = PatternSet::from_csv(&list);
            if !set.is_empty() {
                self.patterns = set;
            }
        }
        if let Ok(ns) = std::env::var(ENV_NAMESPACE) {
            if !ns.trim().is_empty() {
                self.storage_namespace = ns.trim().to_string();
            }
        }
        self
    }

    pub fn validate(&self) -> DetectorResult<()> {
        validate_namespace(&self.storage_namespace)?;
        if self.poll_interval_ms == 0 {
            return Err(DetectorError::InvalidConfig("pollIntervalMs must be positive".into()));
        }
        Ok(())
    }
}

/// Namespaces double as file stems and database names.
pub fn validate_namespace(ns: &str) -> DetectorResult<()> {
    let ok = !ns.is_empty()
        && ns != "."
        && ns != ".."
        && ns.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(DetectorError::InvalidConfig(format!("invalid storage namespace '{}'", ns)))
    }
}
