//! Error kinds for detection and recording.
//!
//! None of these are fatal to the host: compile errors skip one token,
//! extraction faults end one scan, storage errors surface only from
//! `open` and `list_all`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// A configured token could not be turned into a search expression.
    #[error("pattern '{token}' skipped: {reason}")]
    PatternCompile { token: String, reason: String },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Unexpected failure while reading or scanning page text.
    #[error("extraction fault: {0}")]
    ExtractionFault(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DetectorError {
    pub fn storage(e: impl std::fmt::Display) -> Self {
        DetectorError::StorageUnavailable(e.to_string())
    }
}

pub type DetectorResult<T> = Result<T, DetectorError>;
