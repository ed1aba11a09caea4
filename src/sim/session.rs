//! Roll session state machine
//!
//! `Idle -> Spawning -> Simulating -> Settled -> Resolved`, with `TimedOut`
//! and `Cancelled` as the other ways out. One session runs one roll at a time
//! and each `tick` performs exactly one fixed physics step.

use std::fmt;
use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::clock::{ClockEvent, SimClock};
use super::face::FaceResolver;
use super::settle::{SettleDetector, VelocityThreshold};
use super::snapshot::{BodySnapshot, SnapshotFeed};
use super::world::PhysicsWorld;
use crate::error::{RollError, RollResult};
use crate::settings::RollSettings;

/// Lifecycle of a roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RollStatus {
    /// No roll started yet
    Idle,
    /// Dice being placed (transient, inside `start`)
    Spawning,
    /// Stepping physics, checking for rest on the check cadence
    Simulating,
    /// Every die at rest; faces are read on the next tick
    Settled,
    /// Outcome available
    Resolved,
    /// Gave up waiting; best-effort outcome available
    TimedOut,
    /// Abandoned by the caller; no outcome
    Cancelled,
}

impl RollStatus {
    /// No further ticks will change this status
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::TimedOut | Self::Cancelled)
    }

    /// A roll owns the session and a new one may not start
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Spawning | Self::Simulating | Self::Settled)
    }

    /// An outcome can be read
    pub fn has_outcome(self) -> bool {
        matches!(self, Self::Resolved | Self::TimedOut)
    }
}

/// What to roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    pub count: usize,
    /// Minimum face value that counts as a pass
    pub target: u8,
    /// Roll type shown to players, e.g. "Hit roll"
    #[serde(default)]
    pub label: Option<String>,
}

impl RollRequest {
    pub fn new(count: usize, target: u8) -> Self {
        Self {
            count,
            target,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn validate(&self, max_dice: usize) -> RollResult<()> {
        if self.count == 0 {
            return Err(RollError::invalid("count", "must be at least 1"));
        }
        if self.count > max_dice {
            return Err(RollError::invalid(
                "count",
                format!("{} exceeds the limit of {max_dice}", self.count),
            ));
        }
        if !(1..=6).contains(&self.target) {
            return Err(RollError::invalid(
                "target",
                format!("{} outside 1..=6", self.target),
            ));
        }
        Ok(())
    }
}

/// Face values read from a finished roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// One value per die, in spawn order
    pub face_values: Vec<u8>,
    pub pass_count: usize,
    pub target: u8,
    /// False when the roll timed out and some dice may still have been moving
    pub settled: bool,
    /// Simulated time from spawn to resolution
    pub elapsed_ms: u64,
    /// Seed that reproduces this roll
    pub seed: u64,
    pub label: Option<String>,
}

impl RollOutcome {
    pub fn new(
        face_values: Vec<u8>,
        target: u8,
        settled: bool,
        elapsed_ms: u64,
        seed: u64,
        label: Option<String>,
    ) -> Self {
        let pass_count = count_passing(&face_values, target);
        Self {
            face_values,
            pass_count,
            target,
            settled,
            elapsed_ms,
            seed,
            label,
        }
    }

    /// One-line result, e.g. "Hit roll: 3 of 5 dice hit 4+"
    pub fn summary(&self) -> String {
        let dice = if self.face_values.len() == 1 { "die" } else { "dice" };
        let mut line = format!(
            "{} of {} {dice} hit {}+",
            self.pass_count,
            self.face_values.len(),
            self.target
        );
        if let Some(label) = &self.label {
            line = format!("{label}: {line}");
        }
        if !self.settled {
            line.push_str(" (unsettled)");
        }
        line
    }
}

/// Number of values at or above `target`
pub fn count_passing(values: &[u8], target: u8) -> usize {
    values.iter().filter(|&&v| v >= target).count()
}

/// One roll's world, clock and outcome
pub struct RollSession<D = VelocityThreshold> {
    settings: RollSettings,
    world: PhysicsWorld,
    detector: D,
    resolver: FaceResolver,
    rest: VelocityThreshold,
    clock: SimClock,
    status: RollStatus,
    request: Option<RollRequest>,
    outcome: Option<RollOutcome>,
    /// Source of per-roll seeds for `start`
    seeds: Pcg32,
    roll_seed: u64,
    feed: SnapshotFeed,
}

impl RollSession {
    /// Session using the velocity-threshold settle detector from `settings`
    pub fn new(settings: RollSettings, seed: u64) -> RollResult<Self> {
        let detector = VelocityThreshold::from_settings(&settings.settle);
        Self::with_detector(settings, seed, detector)
    }
}

impl<D: SettleDetector> RollSession<D> {
    pub fn with_detector(settings: RollSettings, seed: u64, detector: D) -> RollResult<Self> {
        settings.validate()?;
        let world = PhysicsWorld::new(settings.physics.clone(), settings.die.clone(), seed);
        Ok(Self {
            rest: VelocityThreshold::from_settings(&settings.settle),
            clock: SimClock::new(&settings.timing),
            resolver: FaceResolver::default(),
            world,
            detector,
            status: RollStatus::Idle,
            request: None,
            outcome: None,
            seeds: Pcg32::seed_from_u64(seed),
            roll_seed: seed,
            feed: SnapshotFeed::new(),
            settings,
        })
    }

    /// Replace the face table
    pub fn with_resolver(mut self, resolver: FaceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn status(&self) -> RollStatus {
        self.status
    }

    pub fn request(&self) -> Option<&RollRequest> {
        self.request.as_ref()
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn settings(&self) -> &RollSettings {
        &self.settings
    }

    /// Simulated milliseconds since the current roll spawned
    pub fn elapsed_ms(&self) -> u64 {
        self.clock.elapsed_ms().round() as u64
    }

    /// Start rolling `count` dice against `target`
    pub fn start(&mut self, count: usize, target: u8) -> RollResult<()> {
        self.start_request(RollRequest::new(count, target))
    }

    /// Start a roll with a seed drawn from this session's seed stream
    pub fn start_request(&mut self, request: RollRequest) -> RollResult<()> {
        self.ensure_startable(&request)?;
        let seed = self.seeds.next_u64();
        self.begin(request, seed)
    }

    /// Start a roll from an explicit seed, reproducing any earlier roll that
    /// used the same seed, request and settings
    pub fn start_seeded(&mut self, request: RollRequest, seed: u64) -> RollResult<()> {
        self.ensure_startable(&request)?;
        self.begin(request, seed)
    }

    fn ensure_startable(&self, request: &RollRequest) -> RollResult<()> {
        if self.status.is_busy() {
            return Err(RollError::RollInProgress);
        }
        request.validate(self.settings.max_dice)
    }

    fn begin(&mut self, request: RollRequest, seed: u64) -> RollResult<()> {
        self.status = RollStatus::Spawning;
        self.outcome = None;
        self.clock.reset();
        self.roll_seed = seed;
        self.world.reseed(seed);

        if let Err(e) = self.world.spawn(request.count, &self.settings.spawn) {
            self.world.clear();
            self.status = RollStatus::Idle;
            return Err(e);
        }
        log::debug!(
            "Roll started: {} dice, target {}+, seed {seed}",
            request.count,
            request.target
        );
        self.request = Some(request);
        self.status = RollStatus::Simulating;
        self.publish();
        Ok(())
    }

    /// Advance the roll by one fixed step and return the new status.
    ///
    /// Settle checks only run on the check cadence. A `Settled` session reads
    /// its faces on the following tick and then drops its bodies; the last
    /// published snapshot keeps their final poses. Idle and terminal sessions
    /// are left untouched.
    pub fn tick(&mut self) -> RollStatus {
        match self.status {
            RollStatus::Simulating => {
                self.world.step(self.clock.dt());
                self.publish();
                match self.clock.advance() {
                    ClockEvent::Step => {}
                    ClockEvent::Check => {
                        if self.detector.is_settled(self.world.bodies()) {
                            log::debug!("Dice settled after {} ms", self.elapsed_ms());
                            self.status = RollStatus::Settled;
                        } else {
                            log::trace!(
                                "Settle check at {} ms: {:?}",
                                self.elapsed_ms(),
                                self.rest.resting_mask(self.world.bodies())
                            );
                        }
                    }
                    ClockEvent::Deadline => {
                        if self.detector.is_settled(self.world.bodies()) {
                            self.status = RollStatus::Settled;
                        } else {
                            self.finish(false);
                        }
                    }
                }
            }
            RollStatus::Settled => self.finish(true),
            _ => {}
        }
        self.status
    }

    /// Tick until the roll leaves the simulating states
    pub fn run_to_completion(&mut self) -> RollResult<&RollOutcome> {
        while self.status.is_busy() {
            self.tick();
        }
        self.outcome()
    }

    /// Abandon the roll in progress. Does nothing when idle or finished.
    pub fn cancel(&mut self) -> RollStatus {
        if self.status.is_busy() {
            log::debug!("Roll cancelled at {} ms", self.elapsed_ms());
            self.world.clear();
            self.outcome = None;
            self.status = RollStatus::Cancelled;
            self.feed.clear();
        }
        self.status
    }

    /// The finished outcome, once `Resolved` or `TimedOut`
    pub fn outcome(&self) -> RollResult<&RollOutcome> {
        if !self.status.has_outcome() {
            return Err(RollError::NotReady(self.status));
        }
        self.outcome
            .as_ref()
            .ok_or(RollError::NotReady(self.status))
    }

    /// Poses from the last completed step
    pub fn snapshot(&self) -> Arc<[BodySnapshot]> {
        self.feed.latest()
    }

    /// Shareable reader for the snapshot stream
    pub fn snapshot_feed(&self) -> SnapshotFeed {
        self.feed.clone()
    }

    /// Drop the dice of a finished roll
    pub fn clear(&mut self) {
        if !self.status.is_busy() {
            self.world.clear();
            self.feed.clear();
        }
    }

    fn finish(&mut self, settled: bool) {
        let face_values = self.resolver.resolve_all(self.world.bodies());
        let (target, label) = match &self.request {
            Some(r) => (r.target, r.label.clone()),
            None => (1, None),
        };
        let outcome = RollOutcome::new(
            face_values,
            target,
            settled,
            self.elapsed_ms(),
            self.roll_seed,
            label,
        );

        if settled {
            self.status = RollStatus::Resolved;
            log::info!("{}", outcome.summary());
        } else {
            self.status = RollStatus::TimedOut;
            log::warn!(
                "Roll timed out after {} ms, reporting current faces: {}",
                outcome.elapsed_ms,
                outcome.summary()
            );
        }
        self.outcome = Some(outcome);
        // The published snapshot keeps the final poses
        self.world.clear();
    }

    fn publish(&self) {
        let mask = self.rest.resting_mask(self.world.bodies());
        let snapshot = self
            .world
            .bodies()
            .iter()
            .zip(mask)
            .map(|(body, at_rest)| BodySnapshot::from_body(body, at_rest))
            .collect();
        self.feed.publish(snapshot);
    }
}

impl<D> fmt::Debug for RollSession<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollSession")
            .field("status", &self.status)
            .field("request", &self.request)
            .field("dice", &self.world.len())
            .field("tick", &self.clock.tick())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::RigidBody;
    use proptest::prelude::*;

    fn session(seed: u64) -> RollSession {
        RollSession::new(RollSettings::default(), seed).unwrap()
    }

    #[test]
    fn test_invalid_arguments_leave_session_idle() {
        let mut s = session(1);
        for (count, target) in [(0, 4), (3, 0), (3, 7), (1000, 4)] {
            let err = s.start(count, target).unwrap_err();
            assert!(matches!(err, RollError::InvalidArgument { .. }), "{err}");
            assert_eq!(s.status(), RollStatus::Idle);
        }
        assert!(s.snapshot().is_empty());
    }

    #[test]
    fn test_start_moves_to_simulating() {
        let mut s = session(1);
        s.start(4, 3).unwrap();
        assert_eq!(s.status(), RollStatus::Simulating);
        assert_eq!(s.snapshot().len(), 4);
    }

    #[test]
    fn test_cannot_start_while_busy() {
        let mut s = session(1);
        s.start(2, 4).unwrap();
        assert!(matches!(s.start(2, 4), Err(RollError::RollInProgress)));
        s.tick();
        assert!(matches!(s.start(2, 4), Err(RollError::RollInProgress)));
    }

    #[test]
    fn test_outcome_not_ready_while_simulating() {
        let mut s = session(1);
        assert!(matches!(s.outcome(), Err(RollError::NotReady(RollStatus::Idle))));
        s.start(2, 4).unwrap();
        assert!(matches!(
            s.outcome(),
            Err(RollError::NotReady(RollStatus::Simulating))
        ));
    }

    #[test]
    fn test_roll_runs_to_an_outcome() {
        let mut s = session(42);
        s.start_request(RollRequest::new(5, 4).with_label("Hit roll"))
            .unwrap();
        let outcome = s.run_to_completion().unwrap().clone();
        assert!(s.status().has_outcome());
        assert_eq!(outcome.face_values.len(), 5);
        assert!(outcome.face_values.iter().all(|v| (1..=6).contains(v)));
        assert_eq!(outcome.pass_count, count_passing(&outcome.face_values, 4));
        assert_eq!(outcome.label.as_deref(), Some("Hit roll"));
    }

    #[test]
    fn test_same_seed_same_faces() {
        let request = RollRequest::new(8, 4);
        let mut a = session(0);
        let mut b = session(0);
        a.start_seeded(request.clone(), 777).unwrap();
        b.start_seeded(request, 777).unwrap();
        let oa = a.run_to_completion().unwrap();
        let ob = b.run_to_completion().unwrap();
        assert_eq!(oa, ob);
        assert_eq!(oa.seed, 777);
    }

    #[test]
    fn test_replaying_a_seed_reproduces_the_roll() {
        let mut s = session(9);
        s.start(6, 5).unwrap();
        let first = s.run_to_completion().unwrap().clone();

        s.start_seeded(RollRequest::new(6, 5), first.seed).unwrap();
        let replay = s.run_to_completion().unwrap();
        assert_eq!(replay.face_values, first.face_values);
    }

    #[test]
    fn test_real_rolls_settle_before_deadline() {
        for count in [1, 6, 20] {
            for seed in [1, 2, 3] {
                let mut s = session(seed);
                s.start(count, 4).unwrap();
                let outcome = s.run_to_completion().unwrap().clone();
                assert_eq!(
                    s.status(),
                    RollStatus::Resolved,
                    "{count} dice, seed {seed} timed out"
                );
                assert!(outcome.settled);
                assert!(outcome.elapsed_ms <= s.settings().timing.max_settle_wait_ms as u64);
            }
        }
    }

    #[test]
    fn test_finished_roll_drops_bodies_but_keeps_snapshot() {
        let mut s = session(8);
        s.start(5, 4).unwrap();
        s.run_to_completion().unwrap();
        assert!(s.world().is_empty());

        let snapshot = s.snapshot();
        assert_eq!(snapshot.len(), 5);
        assert!(snapshot.iter().all(|b| b.at_rest == 1.0));
    }

    #[test]
    fn test_never_settling_roll_times_out_on_schedule() {
        let settings = RollSettings::default();
        let max = settings.timing.max_settle_wait_ms as u64;
        let interval = settings.timing.check_interval_ms as u64;
        let never = |_: &[RigidBody]| false;
        let mut s = RollSession::with_detector(settings, 3, never).unwrap();
        s.start(3, 4).unwrap();

        let mut ticks = 0;
        while s.tick() == RollStatus::Simulating {
            ticks += 1;
            assert!(ticks < 10_000, "session never timed out");
        }
        assert_eq!(s.status(), RollStatus::TimedOut);

        let outcome = s.outcome().unwrap();
        assert!(!outcome.settled);
        assert_eq!(outcome.face_values.len(), 3);
        assert!(outcome.elapsed_ms + interval >= max);
        assert!(outcome.elapsed_ms <= max + interval);
    }

    #[test]
    fn test_settled_is_observed_before_resolved() {
        let always = |_: &[RigidBody]| true;
        let mut s = RollSession::with_detector(RollSettings::default(), 3, always).unwrap();
        s.start(2, 4).unwrap();

        let mut status = RollStatus::Simulating;
        while status == RollStatus::Simulating {
            status = s.tick();
        }
        assert_eq!(status, RollStatus::Settled);
        assert!(s.outcome().is_err());
        assert_eq!(s.tick(), RollStatus::Resolved);
        assert!(s.outcome().unwrap().settled);
    }

    #[test]
    fn test_deadline_tick_runs_a_final_settle_check() {
        use std::cell::Cell;

        let settings = RollSettings::default();
        let mut schedule = SimClock::new(&settings.timing);
        let mut checks_before_deadline = 0u64;
        loop {
            match schedule.advance() {
                ClockEvent::Check => checks_before_deadline += 1,
                ClockEvent::Deadline => break,
                ClockEvent::Step => {}
            }
        }

        // Still only on the call made at the deadline
        let calls = Cell::new(0u64);
        let detector = |_: &[RigidBody]| {
            calls.set(calls.get() + 1);
            calls.get() > checks_before_deadline
        };
        let mut s = RollSession::with_detector(settings, 4, detector).unwrap();
        s.start(2, 4).unwrap();

        let mut status = RollStatus::Simulating;
        while status == RollStatus::Simulating {
            status = s.tick();
        }
        assert_eq!(status, RollStatus::Settled);
        assert_eq!(s.tick(), RollStatus::Resolved);
        let outcome = s.outcome().unwrap();
        assert!(outcome.settled);
        assert_eq!(outcome.elapsed_ms, s.settings().timing.max_settle_wait_ms as u64);
    }

    #[test]
    fn test_cancel_discards_roll() {
        let mut s = session(5);
        s.start(4, 4).unwrap();
        for _ in 0..10 {
            s.tick();
        }
        assert_eq!(s.cancel(), RollStatus::Cancelled);
        assert!(matches!(
            s.outcome(),
            Err(RollError::NotReady(RollStatus::Cancelled))
        ));
        assert!(s.snapshot().is_empty());
        assert!(s.world().is_empty());

        // Terminal: further ticks and cancels change nothing
        assert_eq!(s.tick(), RollStatus::Cancelled);
        assert_eq!(s.cancel(), RollStatus::Cancelled);

        s.start(1, 4).unwrap();
        assert_eq!(s.status(), RollStatus::Simulating);
    }

    #[test]
    fn test_cancel_after_resolve_keeps_outcome() {
        let always = |_: &[RigidBody]| true;
        let mut s = RollSession::with_detector(RollSettings::default(), 3, always).unwrap();
        s.start(2, 4).unwrap();
        s.run_to_completion().unwrap();
        assert_eq!(s.cancel(), RollStatus::Resolved);
        assert!(s.outcome().is_ok());
    }

    #[test]
    fn test_summary_text() {
        let outcome = RollOutcome::new(vec![1, 4, 6, 3, 5], 4, true, 2000, 1, None);
        assert_eq!(outcome.summary(), "3 of 5 dice hit 4+");

        let outcome = RollOutcome::new(vec![6], 2, false, 15000, 1, Some("Save".into()));
        assert_eq!(outcome.summary(), "Save: 1 of 1 die hit 2+ (unsettled)");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_outcome_matches_request(count in 1usize..=20, target in 1u8..=6, seed in any::<u64>()) {
            let mut s = session(seed);
            s.start(count, target).unwrap();
            let outcome = s.run_to_completion().unwrap();
            prop_assert_eq!(outcome.face_values.len(), count);
            prop_assert!(outcome.face_values.iter().all(|v| (1..=6).contains(v)));
            prop_assert_eq!(outcome.pass_count, count_passing(&outcome.face_values, target));
        }
    }
}
