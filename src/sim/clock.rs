//! Simulation clock
//!
//! Physics advances one fixed step per tick. Settle checks run on a coarser
//! cadence and the whole roll is bounded by a deadline, all counted in ticks
//! so that the schedule never depends on host frame timing.

use crate::settings::TimingSettings;

/// What the session should do after the current tick's physics step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Keep stepping
    Step,
    /// Run the settle check
    Check,
    /// Deadline reached. Replaces any check due on the same tick; the session
    /// still runs one final settle test before timing out.
    Deadline,
}

/// Fixed-step clock with a settle-check cadence and a deadline
#[derive(Debug, Clone, PartialEq)]
pub struct SimClock {
    dt: f32,
    tick: u64,
    check_every: u64,
    first_check: u64,
    deadline: u64,
}

impl SimClock {
    pub fn new(timing: &TimingSettings) -> Self {
        let check_every = ticks_for(timing.check_interval_ms, timing.dt).max(1);
        let deadline = ticks_for(timing.max_settle_wait_ms, timing.dt).max(1);
        // Round the grace period up to the next check boundary
        let grace = ticks_for(timing.settle_grace_ms, timing.dt);
        let first_check = grace.div_ceil(check_every).max(1) * check_every;
        Self {
            dt: timing.dt,
            tick: 0,
            check_every,
            first_check,
            deadline,
        }
    }

    /// Fixed physics step (seconds)
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Ticks elapsed since the roll started
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated milliseconds elapsed
    pub fn elapsed_ms(&self) -> f64 {
        self.tick as f64 * self.dt as f64 * 1000.0
    }

    pub fn check_interval_ticks(&self) -> u64 {
        self.check_every
    }

    pub fn deadline_ticks(&self) -> u64 {
        self.deadline
    }

    pub fn reset(&mut self) {
        self.tick = 0;
    }

    /// Count one physics step and report what falls due on it
    pub fn advance(&mut self) -> ClockEvent {
        self.tick += 1;
        if self.tick >= self.deadline {
            ClockEvent::Deadline
        } else if self.tick >= self.first_check && self.tick % self.check_every == 0 {
            ClockEvent::Check
        } else {
            ClockEvent::Step
        }
    }
}

/// Whole ticks needed to cover `ms` milliseconds at step `dt`
fn ticks_for(ms: u32, dt: f32) -> u64 {
    let step_ms = dt as f64 * 1000.0;
    // Tolerate f32 rounding in dt before taking the ceiling
    ((ms as f64 / step_ms) - 1e-6).ceil().max(0.0) as u64
}
