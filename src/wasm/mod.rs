//! WASM module: the detector inside a live page
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          WebDetector (JS API)           │
//! │  start, scanNow, listDetections,        │
//! │  toggleOverlay, font size, dispose      │
//! └───────┬─────────────────────┬───────────┘
//!         │                     │
//! ┌───────▼──────────┐ ┌────────▼───────────┐
//! │ observe()        │ │  ScanCoordinator   │
//! │ MutationObserver ├─►  (core, shared)    │
//! └──────────────────┘ └────────┬───────────┘
//!                               │ append
//!                      ┌────────▼───────────┐
//!                      │ IdbDetectionStore  │
//!                      │ IndexedDB "logs"   │
//!                      └────────────────────┘
//! ```

mod detector;
mod observer;
mod store;

pub use detector::WebDetector;
pub use observer::{observe, ObserverHandle};
pub use store::IdbDetectionStore;

use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

pub fn console_warn(s: &str) {
    web_sys::console::warn_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

macro_rules! warn {
    ($($t:tt)*) => {
        crate::wasm::console_warn(&format!($($t)*))
    }
}

pub(crate) use log;
pub(crate) use warn;
