//! Host-independent pieces: patterns, extraction, records, coordination.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod overlay;
pub mod pattern;
pub mod record;
