//! Webdetector: finds credential-looking `token = value` pairs in page markup,
//! keeps watching the page, and records every match.
//!
//! # Architecture
//!
//! ```text
//! Detector / WebDetector (entry point)
//!   │
//!   ├── ScanCoordinator (core, shared)
//!   │     ├── CompiledPatterns: one case-insensitive regex per token
//!   │     └── DetectionSink ──► DetectionStore (JSONL file / memory)
//!   │                         └► IdbDetectionStore (IndexedDB, browser)
//!   │
//!   ├── MutationWatcher (native: watch-channel generations)
//!   │   observe()       (browser: MutationObserver)
//!   │
//!   └── OverlayState (visibility + font size of the results panel)
//! ```
//!
//! # Operations
//!
//! | Operation | Native | Browser |
//! |-----------|--------|---------|
//! | scan once | `detector.scan_once(&doc)` | `detector.scanNow()` |
//! | scan + watch | `detector.start(doc)` | `detector.start()` |
//! | list | `detector.list_detections()` | `detector.listDetections()` |
//! | stop | `handle.dispose()` | `detector.dispose()` |
//!
//! # Features
//!
//! - `native` - CLI, saved pages, JSONL store, HTTP read surface
//! - `wasm` - browser page, MutationObserver, IndexedDB
//!
//! # Usage
//!
//! ```ignore
//! use webdetector::{Detector, DetectorConfig, DetectionStore, LiveDocument};
//! use std::sync::Arc;
//!
//! let detector = Detector::new(DetectorConfig::default(), DetectionStore::memory("demo"))?;
//! let page = Arc::new(LiveDocument::new("https://app.test/", r#"{"access_token": "abc123"}"#));
//! let (first, handle) = detector.start(page.clone()).await;
//!
//! page.append("access_token=xyz789");
//! // ... later
//! handle.dispose();
//! let all = detector.list_detections().await?;
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod core;

// =============================================================================
// Native-only modules (CLI, filesystem, tokio)
// =============================================================================
#[cfg(feature = "native")]
pub mod detector;
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod runtime;
#[cfg(feature = "native")]
pub mod server;
#[cfg(feature = "native")]
pub mod store;
#[cfg(feature = "native")]
pub mod watch;

// =============================================================================
// WASM-only modules (browser, IndexedDB, wasm-bindgen)
// =============================================================================
#[cfg(feature = "wasm")]
pub mod wasm;

// =============================================================================
// Re-exports: Shared
// =============================================================================
pub use core::config::DetectorConfig;
pub use core::coordinator::{DetectionSink, ScanCoordinator, ScanReport, ScanState};
pub use core::error::{DetectorError, DetectorResult};
pub use core::overlay::{render_text, OverlayState};
pub use core::pattern::{extract, CompiledPatterns, PatternSet};
pub use core::record::{Detection, DetectionRecord};

// =============================================================================
// Re-exports: Native
// =============================================================================
#[cfg(feature = "native")]
pub use detector::Detector;
#[cfg(feature = "native")]
pub use runtime::{install_signal_handlers, Shutdown};
#[cfg(feature = "native")]
pub use server::{create_router, create_router_with_name};
#[cfg(feature = "native")]
pub use store::{DetectionStore, StoreKind};
#[cfg(feature = "native")]
pub use watch::{Document, FileDocument, LiveDocument, MutationWatcher, WatchHandle};

// =============================================================================
// Re-exports: WASM
// =============================================================================
#[cfg(feature = "wasm")]
pub use wasm::{IdbDetectionStore, WebDetector};
