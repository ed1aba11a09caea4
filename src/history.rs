//! Recent roll log
//!
//! Persisted to LocalStorage on web, keeps the last 20 finished rolls.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::RollResult;
use crate::sim::RollOutcome;

/// Number of rolls kept by default
pub const MAX_HISTORY: usize = 20;

/// A finished roll as shown in the roll log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub label: Option<String>,
    pub seed: u64,
    pub target: u8,
    pub face_values: Vec<u8>,
    pub pass_count: usize,
    pub settled: bool,
    /// Unix timestamp (ms) when recorded
    pub timestamp: f64,
}

impl HistoryEntry {
    pub fn from_outcome(outcome: &RollOutcome, timestamp: f64) -> Self {
        Self {
            label: outcome.label.clone(),
            seed: outcome.seed,
            target: outcome.target,
            face_values: outcome.face_values.clone(),
            pass_count: outcome.pass_count,
            settled: outcome.settled,
            timestamp,
        }
    }
}

/// Most recent finished rolls, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl Default for RollHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }
}

impl RollHistory {
    /// LocalStorage key (used only in wasm32)
    #[cfg(target_arch = "wasm32")]
    const STORAGE_KEY: &'static str = "dice_tray_history";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Add a finished roll, dropping the oldest once full
    pub fn record(&mut self, outcome: &RollOutcome, timestamp: f64) {
        self.entries
            .push_front(HistoryEntry::from_outcome(outcome, timestamp));
        self.entries.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Total dice rolled and total passes across the log
    pub fn totals(&self) -> (usize, usize) {
        self.entries.iter().fold((0, 0), |(dice, passes), e| {
            (dice + e.face_values.len(), passes + e.pass_count)
        })
    }

    pub fn to_json(&self) -> RollResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> RollResult<Self> {
        let mut history: Self = serde_json::from_str(json)?;
        history.capacity = history.capacity.max(1);
        history.entries.truncate(history.capacity);
        Ok(history)
    }

    /// Load the roll log from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(history) => {
                        log::info!("Loaded {} past rolls", history.len());
                        return history;
                    }
                    Err(e) => log::warn!("Discarding stored roll history: {e}"),
                }
            }
        }
        Self::new()
    }

    /// Save the roll log to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = self.to_json() {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::debug!("Roll history saved ({} entries)", self.len());
            }
        }
    }
}
