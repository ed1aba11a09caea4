//! Deterministic dice simulation
//!
//! Everything that decides a roll's outcome lives here. This module must stay
//! pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies

pub mod body;
pub mod clock;
pub mod collision;
pub mod face;
pub mod session;
pub mod settle;
pub mod snapshot;
pub mod world;

pub use body::{BodyId, RigidBody};
pub use clock::{ClockEvent, SimClock};
pub use face::{D6_FACES, FaceResolver, FaceTable};
pub use session::{RollOutcome, RollRequest, RollSession, RollStatus, count_passing};
pub use settle::{SettleDetector, VelocityThreshold};
pub use snapshot::{BodySnapshot, SnapshotFeed};
pub use world::PhysicsWorld;
