//! DOM change subscription over `MutationObserver`.
//!
//! The browser already delivers mutations in batches: one callback per
//! microtask checkpoint, however many records it carries.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MutationObserver, MutationObserverInit, Node};

pub struct ObserverHandle {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
    disposed: bool,
}

impl ObserverHandle {
    /// Disconnect. Safe to call more than once.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.observer.disconnect();
            self.disposed = true;
        }
    }

    pub fn is_disposed(&self) -> bool { self.disposed }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) { self.dispose() }
}

/// Watch `root` and its subtree for child list and text changes.
pub fn observe(root: &Node, on_change: impl Fn() + 'static) -> Result<ObserverHandle, JsValue> {
    let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |records: js_sys::Array, _observer: MutationObserver| {
            if records.length() > 0 {
                on_change();
            }
        },
    );

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;

    let mut init = MutationObserverInit::new();
    #[allow(deprecated)]
    init.child_list(true).subtree(true).character_data(true);
    observer.observe_with_options(root, &init)?;

    Ok(ObserverHandle { observer, _callback: callback, disposed: false })
}
