//! Handle-based roll API
//!
//! The rest of the application talks to rolls through `RollHandle`s. The tray
//! owns one `RollSession` per handle and pumps them all from a single loop,
//! one fixed step per `tick`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::{RollError, RollResult};
use crate::history::{MAX_HISTORY, RollHistory};
use crate::platform;
use crate::settings::RollSettings;
use crate::sim::{BodySnapshot, RollOutcome, RollRequest, RollSession, RollStatus, SnapshotFeed};

/// Finished rolls kept queryable before the oldest are dropped
pub const RETAINED_FINISHED: usize = MAX_HISTORY;

/// Opaque reference to a roll started on a `DiceTray`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RollHandle(u32);

impl RollHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "roll#{}", self.0)
    }
}

impl From<u32> for RollHandle {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[derive(Debug)]
struct Slot {
    session: RollSession,
    /// Outcome already copied into the history
    recorded: bool,
}

/// Owns every roll in flight and the log of finished ones
#[derive(Debug)]
pub struct DiceTray {
    settings: RollSettings,
    seeds: Pcg32,
    rolls: BTreeMap<RollHandle, Slot>,
    next_handle: u32,
    history: RollHistory,
}

impl DiceTray {
    pub fn new(settings: RollSettings, seed: u64) -> RollResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            seeds: Pcg32::seed_from_u64(seed),
            rolls: BTreeMap::new(),
            next_handle: 1,
            history: RollHistory::new(),
        })
    }

    /// Tray seeded from platform entropy
    pub fn from_entropy(settings: RollSettings) -> RollResult<Self> {
        Self::new(settings, platform::entropy_seed())
    }

    pub fn settings(&self) -> &RollSettings {
        &self.settings
    }

    pub fn history(&self) -> &RollHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut RollHistory {
        &mut self.history
    }

    /// Begin rolling `count` dice against `target`
    pub fn start_roll(&mut self, count: usize, target: u8) -> RollResult<RollHandle> {
        self.start_request(RollRequest::new(count, target))
    }

    pub fn start_request(&mut self, request: RollRequest) -> RollResult<RollHandle> {
        let seed = self.seeds.next_u64();
        let mut session = RollSession::new(self.settings.clone(), seed)?;
        session.start_seeded(request, seed)?;

        let handle = RollHandle(self.next_handle);
        self.next_handle += 1;
        log::debug!("{handle} started with seed {seed}");
        self.rolls.insert(
            handle,
            Slot {
                session,
                recorded: false,
            },
        );
        Ok(handle)
    }

    pub fn poll_status(&self, handle: RollHandle) -> RollResult<RollStatus> {
        Ok(self.slot(handle)?.session.status())
    }

    /// Cancel a roll in flight. Finished rolls keep their status.
    pub fn cancel(&mut self, handle: RollHandle) -> RollResult<RollStatus> {
        Ok(self.slot_mut(handle)?.session.cancel())
    }

    pub fn get_outcome(&self, handle: RollHandle) -> RollResult<RollOutcome> {
        self.slot(handle)?.session.outcome().cloned()
    }

    /// Poses from the roll's last completed step
    pub fn snapshot_bodies(&self, handle: RollHandle) -> RollResult<Arc<[BodySnapshot]>> {
        Ok(self.slot(handle)?.session.snapshot())
    }

    /// Reader that can follow the roll from another thread
    pub fn snapshot_feed(&self, handle: RollHandle) -> RollResult<SnapshotFeed> {
        Ok(self.slot(handle)?.session.snapshot_feed())
    }

    /// Advance every roll in flight by one fixed step.
    ///
    /// Returns how many rolls are still in flight.
    pub fn tick(&mut self) -> usize {
        let mut active = 0;
        for slot in self.rolls.values_mut() {
            if slot.session.status().is_busy() {
                slot.session.tick();
            }
            if slot.session.status().is_busy() {
                active += 1;
            } else {
                record_finished(&mut self.history, slot);
            }
        }
        self.prune_finished();
        active
    }

    /// Drive one roll to its outcome without touching the others
    pub fn run(&mut self, handle: RollHandle) -> RollResult<RollOutcome> {
        let slot = self
            .rolls
            .get_mut(&handle)
            .ok_or(RollError::UnknownHandle(handle))?;
        let outcome = slot.session.run_to_completion()?.clone();
        record_finished(&mut self.history, slot);
        self.prune_finished();
        Ok(outcome)
    }

    /// Forget a roll. Cancels it first if it is still in flight.
    ///
    /// Finished rolls are also dropped automatically once more than
    /// `RETAINED_FINISHED` of them are held.
    pub fn release(&mut self, handle: RollHandle) -> RollResult<()> {
        let mut slot = self
            .rolls
            .remove(&handle)
            .ok_or(RollError::UnknownHandle(handle))?;
        slot.session.cancel();
        log::debug!("{handle} released");
        Ok(())
    }

    /// Rolls currently held, in flight or finished
    pub fn len(&self) -> usize {
        self.rolls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rolls.is_empty()
    }

    /// Drop the oldest finished rolls beyond `RETAINED_FINISHED`.
    /// Their outcomes remain in the history.
    fn prune_finished(&mut self) {
        if self.rolls.len() <= RETAINED_FINISHED {
            return;
        }
        let finished: Vec<RollHandle> = self
            .rolls
            .iter()
            .filter(|(_, slot)| !slot.session.status().is_busy())
            .map(|(handle, _)| *handle)
            .collect();
        let excess = finished.len().saturating_sub(RETAINED_FINISHED);
        for handle in &finished[..excess] {
            self.rolls.remove(handle);
            log::debug!("{handle} pruned");
        }
    }

    fn slot(&self, handle: RollHandle) -> RollResult<&Slot> {
        self.rolls.get(&handle).ok_or(RollError::UnknownHandle(handle))
    }

    fn slot_mut(&mut self, handle: RollHandle) -> RollResult<&mut Slot> {
        self.rolls
            .get_mut(&handle)
            .ok_or(RollError::UnknownHandle(handle))
    }
}

fn record_finished(history: &mut RollHistory, slot: &mut Slot) {
    if slot.recorded {
        return;
    }
    if let Ok(outcome) = slot.session.outcome() {
        history.record(outcome, platform::now_ms());
        slot.recorded = true;
    }
}
