//! Face-up resolution
//!
//! Each face normal is rotated into world space and compared against world
//! up; the face with the largest dot product is the one a player reads. Exact
//! ties only happen when a die is balanced on an edge or corner, and go to the
//! first face in table order.

use glam::{Quat, Vec3};

use super::body::RigidBody;
use crate::WORLD_UP;
use crate::error::{RollError, RollResult};

/// Local face normals paired with their printed values
pub type FaceTable = [(Vec3, u8); 6];

/// Standard D6 layout: opposite faces sum to 7
pub const D6_FACES: FaceTable = [
    (Vec3::X, 1),
    (Vec3::NEG_X, 6),
    (Vec3::Y, 2),
    (Vec3::NEG_Y, 5),
    (Vec3::Z, 3),
    (Vec3::NEG_Z, 4),
];

/// Maps a die orientation to its up-face value
#[derive(Debug, Clone, PartialEq)]
pub struct FaceResolver {
    faces: FaceTable,
    up: Vec3,
}

impl Default for FaceResolver {
    fn default() -> Self {
        Self {
            faces: D6_FACES,
            up: WORLD_UP,
        }
    }
}

impl FaceResolver {
    /// Build a resolver from a custom face table.
    ///
    /// The table must carry each value 1..=6 exactly once on unit normals.
    pub fn new(faces: FaceTable) -> RollResult<Self> {
        let mut seen = [false; 6];
        for (normal, value) in &faces {
            if !(1..=6).contains(value) {
                return Err(RollError::invalid("faces", format!("value {value} outside 1..=6")));
            }
            let slot = &mut seen[(*value - 1) as usize];
            if *slot {
                return Err(RollError::invalid("faces", format!("value {value} appears twice")));
            }
            *slot = true;
            if !normal.is_normalized() {
                return Err(RollError::invalid("faces", "normals must be unit length"));
            }
        }
        Ok(Self {
            faces,
            up: WORLD_UP,
        })
    }

    pub fn faces(&self) -> &FaceTable {
        &self.faces
    }

    /// Value of the face pointing most nearly up
    pub fn resolve(&self, orientation: Quat) -> u8 {
        debug_assert!(orientation.is_finite(), "non-finite orientation");

        let mut best_value = self.faces[0].1;
        let mut best_dot = f32::NEG_INFINITY;
        for &(normal, value) in &self.faces {
            let d = (orientation * normal).dot(self.up);
            if d > best_dot {
                best_dot = d;
                best_value = value;
            }
        }
        best_value
    }

    pub fn resolve_body(&self, body: &RigidBody) -> u8 {
        self.resolve(body.orientation)
    }

    /// Values for every body, index-aligned
    pub fn resolve_all(&self, bodies: &[RigidBody]) -> Vec<u8> {
        bodies.iter().map(|b| self.resolve_body(b)).collect()
    }
}
