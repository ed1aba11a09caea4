//! Dice Tray - physical dice rolls for tabletop wargaming
//!
//! Core modules:
//! - `sim`: Deterministic simulation (rigid bodies, contacts, settling, face resolution)
//! - `tray`: Handle-based roll API for the rest of the application
//! - `platform`: Browser/native platform glue
//! - `settings`: Data-driven physics and timing tuning
//! - `history`: Recent roll log

pub mod error;
pub mod history;
pub mod platform;
pub mod settings;
pub mod sim;
pub mod tray;

pub use error::{RollError, RollResult};
pub use history::{HistoryEntry, RollHistory};
pub use settings::RollSettings;
pub use sim::{RollOutcome, RollRequest, RollSession, RollStatus};
pub use tray::{DiceTray, RollHandle};

use glam::{Quat, Vec3};

/// Tuned physical constants (world units are roughly inches)
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Edge length of one die
    pub const DIE_SIZE: f32 = 0.75;
    pub const DIE_MASS: f32 = 1.0;
    /// Gap between dice on the spawn grid
    pub const DIE_SPACING: f32 = 0.1;

    /// Downward gravity, stronger than real for faster settling
    pub const GRAVITY_Y: f32 = -30.0;

    /// Die/ground contact
    pub const GROUND_FRICTION: f32 = 0.1;
    pub const GROUND_RESTITUTION: f32 = 0.6;
    /// Die/die contact
    pub const DIE_FRICTION: f32 = 0.3;
    pub const DIE_RESTITUTION: f32 = 0.0;

    /// Settlement thresholds (per-sample)
    pub const SETTLE_LINEAR_EPS: f32 = 0.1;
    pub const SETTLE_ANGULAR_EPS: f32 = 0.2;

    /// Settle-check cadence and bounds (milliseconds)
    pub const CHECK_INTERVAL_MS: u32 = 200;
    pub const SETTLE_GRACE_MS: u32 = 1000;
    pub const MAX_SETTLE_WAIT_MS: u32 = 15_000;

    /// Sanity bounds applied after every step
    pub const MAX_LINEAR_SPEED: f32 = 50.0;
    pub const MAX_ANGULAR_SPEED: f32 = 60.0;

    /// Upper bound on dice per roll
    pub const MAX_DICE: usize = 100;
}

/// World "up" direction
pub const WORLD_UP: Vec3 = Vec3::Y;

/// Clamp a vector's length, zeroing it if any component is non-finite.
///
/// Returns the sanitized vector and whether anything was changed.
#[inline]
pub fn sanitize_vec(v: Vec3, max_len: f32) -> (Vec3, bool) {
    if !v.is_finite() {
        return (Vec3::ZERO, true);
    }
    if v.length_squared() > max_len * max_len {
        return (v.clamp_length_max(max_len), true);
    }
    (v, false)
}

/// Advance an orientation by angular velocity over `dt` and renormalize.
///
/// q' = normalize(q + 0.5 * dt * (ω, 0) ⊗ q)
#[inline]
pub fn integrate_rotation(rotation: Quat, angular_velocity: Vec3, dt: f32) -> Quat {
    let q_xyz = Vec3::new(rotation.x, rotation.y, rotation.z);
    let q_w = rotation.w;

    let spin_xyz = q_w * angular_velocity + angular_velocity.cross(q_xyz);
    let spin_w = -angular_velocity.dot(q_xyz);

    let half_dt = 0.5 * dt;
    Quat::from_xyzw(
        rotation.x + spin_xyz.x * half_dt,
        rotation.y + spin_xyz.y * half_dt,
        rotation.z + spin_xyz.z * half_dt,
        rotation.w + spin_w * half_dt,
    )
    .normalize()
}
