//! Rigid cube state

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Identifier of a body, unique within one roll
pub type BodyId = u32;

/// Unit cube corners in local space (scaled by half extent)
const CORNER_SIGNS: [Vec3; 8] = [
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(-1.0, 1.0, 1.0),
];

/// A single die
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    pub id: BodyId,
    pub position: Vec3,
    /// Always unit length
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub half_extent: f32,
    pub mass: f32,
}

impl RigidBody {
    /// A cube at rest with identity orientation
    pub fn new(id: BodyId, position: Vec3, half_extent: f32, mass: f32) -> Self {
        Self {
            id,
            position,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            half_extent,
            mass,
        }
    }

    #[inline]
    pub fn inv_mass(&self) -> f32 {
        1.0 / self.mass
    }

    /// Inverse moment of inertia. A solid cube's inertia tensor is
    /// isotropic (2/3 m h²), so it is the same scalar in every frame.
    #[inline]
    pub fn inv_inertia(&self) -> f32 {
        1.5 / (self.mass * self.half_extent * self.half_extent)
    }

    /// Velocity of a point at offset `r` from the centre
    #[inline]
    pub fn velocity_at(&self, r: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(r)
    }

    /// Apply an impulse at offset `r` from the centre
    #[inline]
    pub fn apply_impulse(&mut self, impulse: Vec3, r: Vec3) {
        self.linear_velocity += impulse * self.inv_mass();
        self.angular_velocity += r.cross(impulse) * self.inv_inertia();
    }

    /// Corners in world space
    pub fn corners(&self) -> [Vec3; 8] {
        CORNER_SIGNS.map(|s| self.position + self.orientation * (s * self.half_extent))
    }

    /// Transform a world point into this body's local frame
    #[inline]
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.orientation.inverse() * (point - self.position)
    }

    /// Lowest corner height (negative means below the ground)
    pub fn lowest_point(&self) -> f32 {
        self.corners()
            .iter()
            .map(|c| c.y)
            .fold(f32::INFINITY, f32::min)
    }

    /// Advance position and orientation by the current velocities
    pub fn integrate(&mut self, dt: f32) {
        self.position += self.linear_velocity * dt;
        self.orientation = crate::integrate_rotation(self.orientation, self.angular_velocity, dt);
    }

    pub fn kinetic_energy(&self) -> f32 {
        let inertia = 1.0 / self.inv_inertia();
        0.5 * self.mass * self.linear_velocity.length_squared()
            + 0.5 * inertia * self.angular_velocity.length_squared()
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.orientation.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
    }
}
