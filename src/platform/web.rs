//! JavaScript bindings
//!
//! Thin wrapper over `DiceTray` for the browser. Outcomes and history cross
//! the boundary as JSON; snapshots as a flat `Float32Array`, 8 floats per die
//! (position xyz, at-rest flag, orientation xyzw).

use wasm_bindgen::prelude::*;

use crate::error::RollError;
use crate::history::RollHistory;
use crate::settings::RollSettings;
use crate::sim::RollRequest;
use crate::sim::snapshot::as_floats;
use crate::tray::{DiceTray, RollHandle};

fn to_js(err: RollError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Install the console logger and panic hook. Safe to call more than once.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen]
pub struct WebDiceTray {
    tray: DiceTray,
    /// Seed of the newest history entry already written to storage
    saved_seed: Option<u64>,
}

#[wasm_bindgen]
impl WebDiceTray {
    /// Tray using stored settings; pass a seed for reproducible rolls
    #[wasm_bindgen(constructor)]
    pub fn new(seed: Option<f64>) -> Result<WebDiceTray, JsValue> {
        let settings = RollSettings::load();
        let mut tray = match seed {
            Some(seed) => DiceTray::new(settings, seed as u64),
            None => DiceTray::from_entropy(settings),
        }
        .map_err(to_js)?;
        *tray.history_mut() = RollHistory::load();
        let saved_seed = tray.history().latest().map(|e| e.seed);
        log::info!("Dice tray ready");
        Ok(Self { tray, saved_seed })
    }

    #[wasm_bindgen(js_name = startRoll)]
    pub fn start_roll(
        &mut self,
        count: u32,
        target: u8,
        label: Option<String>,
    ) -> Result<u32, JsValue> {
        let mut request = RollRequest::new(count as usize, target);
        request.label = label;
        let handle = self.tray.start_request(request).map_err(to_js)?;
        Ok(handle.id())
    }

    /// Status name, e.g. "Simulating"
    #[wasm_bindgen(js_name = pollStatus)]
    pub fn poll_status(&self, handle: u32) -> Result<String, JsValue> {
        let status = self.tray.poll_status(handle.into()).map_err(to_js)?;
        Ok(format!("{status:?}"))
    }

    pub fn cancel(&mut self, handle: u32) -> Result<String, JsValue> {
        let status = self.tray.cancel(handle.into()).map_err(to_js)?;
        Ok(format!("{status:?}"))
    }

    /// Outcome as JSON
    #[wasm_bindgen(js_name = getOutcome)]
    pub fn get_outcome(&self, handle: u32) -> Result<String, JsValue> {
        let outcome = self.tray.get_outcome(handle.into()).map_err(to_js)?;
        serde_json::to_string(&outcome).map_err(|e| to_js(e.into()))
    }

    #[wasm_bindgen(js_name = snapshotBodies)]
    pub fn snapshot_bodies(&self, handle: u32) -> Result<Vec<f32>, JsValue> {
        let snapshot = self
            .tray
            .snapshot_bodies(RollHandle::from(handle))
            .map_err(to_js)?;
        Ok(as_floats(&snapshot).to_vec())
    }

    /// Call once per animation frame; returns rolls still in flight
    pub fn tick(&mut self) -> u32 {
        let active = self.tray.tick() as u32;
        let newest = self.tray.history().latest().map(|e| e.seed);
        if newest != self.saved_seed {
            self.tray.history().save();
            self.saved_seed = newest;
        }
        active
    }

    pub fn release(&mut self, handle: u32) -> Result<(), JsValue> {
        self.tray.release(handle.into()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = historyJson)]
    pub fn history_json(&self) -> Result<String, JsValue> {
        self.tray.history().to_json().map_err(to_js)
    }
}
