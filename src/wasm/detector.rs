//! WebDetector: the JS-facing detector for the current page.

use super::observer::{observe, ObserverHandle};
use super::store::IdbDetectionStore;
use super::{log, warn};
use crate::core::config::DetectorConfig;
use crate::core::coordinator::{ScanCoordinator, ScanReport};
use crate::core::overlay::{render_text, OverlayState};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::HtmlIFrameElement;

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

struct Inner {
    config: DetectorConfig,
    store: IdbDetectionStore,
    coordinator: ScanCoordinator<IdbDetectionStore>,
    overlay: RefCell<OverlayState>,
    observer: RefCell<Option<ObserverHandle>>,
    pending: Cell<bool>,
}

#[wasm_bindgen]
pub struct WebDetector {
    inner: Rc<Inner>,
}

#[wasm_bindgen]
impl WebDetector {
    /// `config` is optional; missing fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WebDetector, JsValue> {
        let config: DetectorConfig = if config.is_undefined() || config.is_null() {
            DetectorConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_err)?
        };
        config.validate().map_err(js_err)?;

        let patterns = config.patterns.compile();
        for skipped in patterns.skipped() {
            warn!("[WebDetector] {}", skipped);
        }
        let store = IdbDetectionStore::new(&config.storage_namespace);
        log!("[WebDetector] {} patterns, namespace '{}'", patterns.len(), config.storage_namespace);

        Ok(Self {
            inner: Rc::new(Inner {
                coordinator: ScanCoordinator::new(patterns, store.clone()),
                store,
                config,
                overlay: RefCell::new(OverlayState::default()),
                observer: RefCell::new(None),
                pending: Cell::new(false),
            }),
        })
    }

    /// Open storage, watch the document, run the first scan.
    /// Resolves to the first scan's detections.
    #[wasm_bindgen]
    pub async fn start(&self) -> Result<JsValue, JsValue> {
        if let Err(e) = self.inner.store.open().await {
            warn!("[WebDetector] detections will not be recorded: {}", e);
        }

        if self.inner.observer.borrow().is_none() {
            let root = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|d| d.document_element())
                .ok_or_else(|| JsValue::from_str("no document to observe"))?;
            let weak = Rc::downgrade(&self.inner);
            let handle = observe(&root, move || on_mutation(&weak))?;
            *self.inner.observer.borrow_mut() = Some(handle);
        }

        let report = scan_page(&self.inner);
        serde_wasm_bindgen::to_value(&report.detections).map_err(js_err)
    }

    #[wasm_bindgen(js_name = "scanNow")]
    pub fn scan_now(&self) -> Result<JsValue, JsValue> {
        let report = scan_page(&self.inner);
        serde_wasm_bindgen::to_value(&report.detections).map_err(js_err)
    }

    #[wasm_bindgen(js_name = "listDetections")]
    pub async fn list_detections(&self) -> Result<JsValue, JsValue> {
        let records = self.inner.store.list_all().await.map_err(js_err)?;
        serde_wasm_bindgen::to_value(&records).map_err(js_err)
    }

    /// What the overlay panel shows.
    #[wasm_bindgen(js_name = "overlayText")]
    pub async fn overlay_text(&self) -> Result<String, JsValue> {
        let records = self.inner.store.list_all().await.map_err(js_err)?;
        Ok(render_text(&records))
    }

    #[wasm_bindgen(js_name = "toggleOverlay")]
    pub fn toggle_overlay(&self) -> bool { self.inner.overlay.borrow_mut().toggle() }

    #[wasm_bindgen(js_name = "increaseFontSize")]
    pub fn increase_font_size(&self) -> u32 { self.inner.overlay.borrow_mut().increase_font() }

    #[wasm_bindgen(js_name = "decreaseFontSize")]
    pub fn decrease_font_size(&self) -> u32 { self.inner.overlay.borrow_mut().decrease_font() }

    #[wasm_bindgen]
    pub fn overlay(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&*self.inner.overlay.borrow()).map_err(js_err)
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.coordinator.state()).map_err(js_err)
    }

    /// Stop observing. Idempotent; storage stays readable.
    #[wasm_bindgen]
    pub fn dispose(&self) {
        if let Some(mut handle) = self.inner.observer.borrow_mut().take() {
            handle.dispose();
            log!("[WebDetector] stopped observing");
        }
    }
}

fn on_mutation(weak: &Weak<Inner>) {
    let Some(inner) = weak.upgrade() else { return };
    let Some(ms) = inner.config.debounce_ms else {
        scan_page(&inner);
        return;
    };
    if inner.pending.replace(true) {
        return;
    }
    let weak = weak.clone();
    spawn_local(async move {
        sleep_ms(ms).await;
        if let Some(inner) = weak.upgrade() {
            inner.pending.set(false);
            if inner.observer.borrow().is_some() {
                scan_page(&inner);
            }
        }
    });
}

/// The top document plus every same-origin frame.
fn scan_page(inner: &Inner) -> ScanReport {
    let _scan = inner.coordinator.enter();
    let mut report = ScanReport::default();

    let Some(window) = web_sys::window() else { return report };
    let Some(document) = window.document() else { return report };

    let url = window.location().href().unwrap_or_default();
    if let Some(root) = document.document_element() {
        report.detections.extend(inner.coordinator.forward_matches(&url, &root.inner_html()).detections);
    }

    if let Ok(frames) = document.query_selector_all("iframe") {
        for i in 0..frames.length() {
            let Some(frame) = frames.item(i).and_then(|n| n.dyn_into::<HtmlIFrameElement>().ok()) else { continue };
            let src = frame.src();
            match frame.content_document().and_then(|d| d.document_element()) {
                Some(root) => {
                    report.detections.extend(inner.coordinator.forward_matches(&src, &root.inner_html()).detections);
                }
                None => log!("[WebDetector] frame not readable, skipped: {}", src),
            }
        }
    }

    for d in &report.detections {
        log!("Match found: {} = {}", d.key, d.value);
    }
    report
}

async fn sleep_ms(ms: u64) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window()
            .map(|w| w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms.min(i32::MAX as u64) as i32).is_ok())
            .unwrap_or(false);
        if !scheduled {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = JsFuture::from(promise).await;
}
