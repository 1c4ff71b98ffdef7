//! IndexedDB detection log
//!
//! One database per storage namespace, one object store `logs` keyed by an
//! auto-incrementing `id`.

use super::log;
use crate::core::coordinator::DetectionSink;
use crate::core::error::{DetectorError, DetectorResult};
use crate::core::record::{Detection, DetectionRecord};
use indexed_db_futures::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::IdbObjectStoreParameters;

const STORE_NAME: &str = "logs";
const DB_VERSION: u32 = 1;

fn idb_err(e: impl std::fmt::Debug) -> DetectorError {
    DetectorError::StorageUnavailable(format!("IndexedDB: {:?}", e))
}

/// Cheap to clone; clones share the open database.
#[derive(Clone)]
pub struct IdbDetectionStore {
    db_name: String,
    db: Rc<RefCell<Option<IdbDatabase>>>,
}

impl IdbDetectionStore {
    pub fn new(db_name: &str) -> Self {
        Self { db_name: db_name.to_string(), db: Rc::new(RefCell::new(None)) }
    }

    pub fn is_open(&self) -> bool { self.db.borrow().is_some() }

    /// Create the `logs` store on first open; later opens leave data alone.
    pub async fn open(&self) -> DetectorResult<()> {
        if self.is_open() {
            return Ok(());
        }

        let mut db_req = IdbDatabase::open_u32(&self.db_name, DB_VERSION).map_err(idb_err)?;

        db_req.set_on_upgrade_needed(Some(|evt: &IdbVersionChangeEvent| -> Result<(), JsValue> {
            if !evt.db().object_store_names().any(|n| n == STORE_NAME) {
                let mut params = IdbObjectStoreParameters::new();
                #[allow(deprecated)]
                params.key_path(Some(&JsValue::from_str("id"))).auto_increment(true);
                evt.db().create_object_store_with_params(STORE_NAME, &params)?;
            }
            Ok(())
        }));

        let db = db_req.await.map_err(idb_err)?;
        *self.db.borrow_mut() = Some(db);
        log!("[WebDetector] IndexedDB '{}' open", self.db_name);
        Ok(())
    }

    /// Fire-and-forget; dropped when the database is not open yet.
    pub fn append(&self, detection: Detection) {
        if !self.is_open() {
            return;
        }
        let this = self.clone();
        spawn_local(async move {
            if let Err(e) = this.add(detection).await {
                log!("[WebDetector] append dropped: {}", e);
            }
        });
    }

    async fn add(&self, detection: Detection) -> DetectorResult<()> {
        let js_val = serde_wasm_bindgen::to_value(&detection).map_err(DetectorError::storage)?;

        {
            let db_ref = self.db.borrow();
            let db = db_ref.as_ref()
                .ok_or_else(|| DetectorError::StorageUnavailable("database not open".into()))?;

            let tx = db.transaction_on_one_with_mode(STORE_NAME, IdbTransactionMode::Readwrite)
                .map_err(idb_err)?;

            let store = tx.object_store(STORE_NAME).map_err(idb_err)?;

            store.add_val_owned(js_val).map_err(idb_err)?
        }.await
            .map_err(idb_err)?;

        Ok(())
    }

    /// Every record in key order, which is insertion order.
    pub async fn list_all(&self) -> DetectorResult<Vec<DetectionRecord>> {
        let values = {
            let db_ref = self.db.borrow();
            let db = db_ref.as_ref()
                .ok_or_else(|| DetectorError::StorageUnavailable("store not open".into()))?;

            let tx = db.transaction_on_one_with_mode(STORE_NAME, IdbTransactionMode::Readonly)
                .map_err(idb_err)?;

            let store = tx.object_store(STORE_NAME).map_err(idb_err)?;

            store.get_all().map_err(idb_err)?
        }.await
            .map_err(idb_err)?;

        let mut records = Vec::with_capacity(values.length() as usize);
        for value in values.iter() {
            let record: DetectionRecord = serde_wasm_bindgen::from_value(value).map_err(DetectorError::storage)?;
            records.push(record);
        }
        Ok(records)
    }
}

impl DetectionSink for IdbDetectionStore {
    fn append(&self, detection: Detection) { IdbDetectionStore::append(self, detection) }
}
