//! Physics world: gravity, ground plane and the dice population
//!
//! Advances every body by one fixed increment per `step`. Bodies are kept in
//! spawn order for the lifetime of a roll; index identity is die identity.

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::body::{BodyId, RigidBody};
use super::collision::{self, Contact, ContactMaterial};
use crate::error::{RollError, RollResult};
use crate::sanitize_vec;
use crate::settings::{DieSettings, PhysicsSettings, SpawnSettings};

/// Fraction of overlap removed per step when separating dice
const SEPARATION_PERCENT: f32 = 0.8;

/// Owns and advances the physical state of one roll
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    physics: PhysicsSettings,
    die: DieSettings,
    bodies: Vec<RigidBody>,
    /// Per-step scratch, reused to avoid reallocating
    contacts: Vec<Contact>,
    rng: Pcg32,
    next_id: BodyId,
    steps: u64,
    clamp_events: u64,
}

impl PhysicsWorld {
    pub fn new(physics: PhysicsSettings, die: DieSettings, seed: u64) -> Self {
        Self {
            physics,
            die,
            bodies: Vec::new(),
            contacts: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            next_id: 1,
            steps: 0,
            clamp_events: 0,
        }
    }

    /// Restart the random stream
    pub fn reseed(&mut self, seed: u64) {
        self.rng = Pcg32::seed_from_u64(seed);
    }

    pub fn gravity(&self) -> Vec3 {
        self.physics.gravity
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// Direct access for hand-built scenarios
    pub fn bodies_mut(&mut self) -> &mut [RigidBody] {
        &mut self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Steps taken since creation
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Times a numerical clamp had to repair a body
    pub fn clamp_events(&self) -> u64 {
        self.clamp_events
    }

    /// Add a single body at an explicit pose
    pub fn insert(&mut self, position: Vec3, orientation: Quat) -> BodyId {
        let id = self.next_entity_id();
        let mut body = RigidBody::new(id, position, self.die.half_extent, self.die.mass);
        body.orientation = orientation.normalize();
        self.bodies.push(body);
        id
    }

    /// Replace the population with `count` dice on a grid above the origin,
    /// each launched with a random upward velocity and spin.
    pub fn spawn(&mut self, count: usize, layout: &SpawnSettings) -> RollResult<Vec<BodyId>> {
        if count == 0 {
            return Err(RollError::invalid("count", "must be at least 1"));
        }
        self.clear();

        let size = self.die.half_extent * 2.0;
        let spacing = size + layout.margin;
        let per_row = (count as f32).sqrt().ceil() as usize;
        let start = -((per_row - 1) as f32) * spacing / 2.0;
        // Never let jitter close the gap between neighbours
        let jitter = layout.horizontal_jitter.min(layout.margin * 0.45).max(0.0);

        let up_min = layout.min_upward_speed.min(layout.max_upward_speed);
        let up_max = layout.max_upward_speed.max(layout.min_upward_speed);

        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let row = i / per_row;
            let col = i % per_row;

            let x = start + col as f32 * spacing + self.rng.random_range(-jitter..=jitter);
            let z = start + row as f32 * spacing + self.rng.random_range(-jitter..=jitter);
            let y = layout.base_height.max(self.die.half_extent)
                + self.rng.random_range(0.0..=layout.elevation_jitter.max(0.0));

            let orientation = if layout.randomize_orientation {
                random_orientation(&mut self.rng)
            } else {
                Quat::IDENTITY
            };

            let h = layout.max_horizontal_speed.abs();
            let linear_velocity = Vec3::new(
                self.rng.random_range(-h..=h),
                self.rng.random_range(up_min..=up_max),
                self.rng.random_range(-h..=h),
            );
            let w = layout.max_spin.abs();
            let angular_velocity = Vec3::new(
                self.rng.random_range(-w..=w),
                self.rng.random_range(-w..=w),
                self.rng.random_range(-w..=w),
            );

            let id = self.next_entity_id();
            self.bodies.push(RigidBody {
                id,
                position: Vec3::new(x, y, z),
                orientation,
                linear_velocity,
                angular_velocity,
                half_extent: self.die.half_extent,
                mass: self.die.mass,
            });
            ids.push(id);
        }

        log::debug!("Spawned {count} dice in a {per_row}-wide grid");
        Ok(ids)
    }

    /// Advance every body by exactly `dt`
    pub fn step(&mut self, dt: f32) {
        self.steps += 1;
        if self.bodies.is_empty() {
            return;
        }

        let gravity = self.physics.gravity;
        let linear_keep = (1.0 - self.physics.linear_damping.clamp(0.0, 0.99)).powf(dt);
        let angular_keep = (1.0 - self.physics.angular_damping.clamp(0.0, 0.99)).powf(dt);
        for body in &mut self.bodies {
            body.linear_velocity = (body.linear_velocity + gravity * dt) * linear_keep;
            body.angular_velocity *= angular_keep;
        }

        // Contacts
        let slop = self.physics.contact_slop;
        let ground = ContactMaterial {
            friction: self.physics.ground_friction,
            restitution: self.physics.ground_restitution,
        };
        let dice = ContactMaterial {
            friction: self.physics.die_friction,
            restitution: self.physics.die_restitution,
        };
        self.contacts.clear();
        for (i, body) in self.bodies.iter().enumerate() {
            collision::ground_contacts(i, body, slop, dt, ground, &mut self.contacts);
        }
        for i in 0..self.bodies.len() {
            for j in (i + 1)..self.bodies.len() {
                collision::pair_contacts(
                    i,
                    &self.bodies[i],
                    j,
                    &self.bodies[j],
                    slop,
                    dice,
                    &mut self.contacts,
                );
            }
        }

        collision::prepare_contacts(
            &self.bodies,
            &mut self.contacts,
            self.physics.restitution_threshold,
            slop,
            dt,
        );
        collision::solve_contacts(
            &mut self.bodies,
            &mut self.contacts,
            self.physics.solver_iterations,
        );

        let mut clamped = self.clamp_velocities();

        for body in &mut self.bodies {
            body.integrate(dt);
        }
        collision::separate_bodies(&mut self.bodies, &self.contacts, slop, SEPARATION_PERCENT);
        for body in &mut self.bodies {
            collision::lift_out_of_ground(body);
        }

        clamped += self.repair_poses();
        if clamped > 0 {
            self.clamp_events += clamped as u64;
            log::warn!("Clamped {clamped} body state(s) at step {}", self.steps);
        }

        log::trace!(
            "step {}: {} contacts, kinetic energy {:.4}",
            self.steps,
            self.contacts.len(),
            self.kinetic_energy()
        );
    }

    /// Total kinetic energy of all bodies
    pub fn kinetic_energy(&self) -> f32 {
        self.bodies.iter().map(RigidBody::kinetic_energy).sum()
    }

    /// Remove every body. Safe to call repeatedly.
    pub fn clear(&mut self) {
        if !self.bodies.is_empty() {
            log::debug!("Clearing {} dice", self.bodies.len());
        }
        self.bodies.clear();
        self.contacts.clear();
    }

    fn next_entity_id(&mut self) -> BodyId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Zero non-finite velocities and cap runaway speeds
    fn clamp_velocities(&mut self) -> usize {
        let mut count = 0;
        for body in &mut self.bodies {
            let (v, lin) = sanitize_vec(body.linear_velocity, self.physics.max_linear_speed);
            let (w, ang) = sanitize_vec(body.angular_velocity, self.physics.max_angular_speed);
            body.linear_velocity = v;
            body.angular_velocity = w;
            if lin || ang {
                count += 1;
            }
        }
        count
    }

    /// Reset any pose that went non-finite
    fn repair_poses(&mut self) -> usize {
        let mut count = 0;
        for body in &mut self.bodies {
            let mut repaired = false;
            if !body.position.is_finite() {
                body.position = Vec3::new(0.0, body.half_extent, 0.0);
                repaired = true;
            }
            if !body.orientation.is_finite() || body.orientation.length_squared() < 1e-12 {
                body.orientation = Quat::IDENTITY;
                repaired = true;
            } else if !body.orientation.is_normalized() {
                body.orientation = body.orientation.normalize();
            }
            if repaired {
                body.linear_velocity = Vec3::ZERO;
                body.angular_velocity = Vec3::ZERO;
                count += 1;
            }
        }
        count
    }
}

/// Uniformly distributed unit quaternion (Shoemake's method)
fn random_orientation(rng: &mut Pcg32) -> Quat {
    use std::f32::consts::TAU;
    let u1: f32 = rng.random();
    let u2: f32 = rng.random();
    let u3: f32 = rng.random();
    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    Quat::from_xyzw(
        a * (TAU * u2).sin(),
        a * (TAU * u2).cos(),
        b * (TAU * u3).sin(),
        b * (TAU * u3).cos(),
    )
    .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::settings::RollSettings;

    fn world(seed: u64) -> PhysicsWorld {
        let settings = RollSettings::default();
        PhysicsWorld::new(settings.physics, settings.die, seed)
    }

    #[test]
    fn test_spawn_zero_is_invalid() {
        let mut w = world(1);
        let err = w.spawn(0, &SpawnSettings::default()).unwrap_err();
        assert!(matches!(err, RollError::InvalidArgument { name: "count", .. }));
        assert!(w.is_empty());
    }

    #[test]
    fn test_spawn_grid_is_ordered_and_separated() {
        let mut w = world(7);
        let ids = w.spawn(9, &SpawnSettings::default()).unwrap();
        assert_eq!(ids.len(), 9);
        assert_eq!(w.len(), 9);
        for (body, id) in w.bodies().iter().zip(&ids) {
            assert_eq!(body.id, *id);
        }

        let size = w.bodies()[0].half_extent * 2.0;
        for (i, a) in w.bodies().iter().enumerate() {
            for b in &w.bodies()[i + 1..] {
                let dx = (a.position.x - b.position.x).abs();
                let dz = (a.position.z - b.position.z).abs();
                assert!(dx.max(dz) > size, "dice {} and {} overlap", a.id, b.id);
            }
        }
    }

    #[test]
    fn test_spawn_launches_every_die() {
        let mut w = world(99);
        let layout = SpawnSettings::default();
        w.spawn(12, &layout).unwrap();
        for body in w.bodies() {
            assert!(body.linear_velocity.y >= layout.min_upward_speed);
            assert!(body.angular_velocity.length() > 0.0);
            assert!(body.position.y >= layout.base_height);
            assert!(body.orientation.is_normalized());
        }
    }

    #[test]
    fn test_spawn_replaces_previous_batch() {
        let mut w = world(3);
        w.spawn(5, &SpawnSettings::default()).unwrap();
        w.spawn(2, &SpawnSettings::default()).unwrap();
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut w = world(3);
        w.spawn(4, &SpawnSettings::default()).unwrap();
        w.clear();
        assert!(w.is_empty());
        w.clear();
        assert!(w.is_empty());
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let mut a = world(1234);
        let mut b = world(1234);
        a.spawn(6, &SpawnSettings::default()).unwrap();
        b.spawn(6, &SpawnSettings::default()).unwrap();
        for _ in 0..300 {
            a.step(SIM_DT);
            b.step(SIM_DT);
        }
        assert_eq!(a.bodies(), b.bodies());
    }

    #[test]
    fn test_different_seed_different_spawn() {
        let mut a = world(1);
        let mut b = world(2);
        a.spawn(3, &SpawnSettings::default()).unwrap();
        b.spawn(3, &SpawnSettings::default()).unwrap();
        assert_ne!(a.bodies(), b.bodies());
    }

    #[test]
    fn test_reseed_reproduces_spawn() {
        let mut w = world(5);
        w.spawn(4, &SpawnSettings::default()).unwrap();
        let first: Vec<_> = w.bodies().iter().map(|b| b.position).collect();
        w.reseed(5);
        w.spawn(4, &SpawnSettings::default()).unwrap();
        let second: Vec<_> = w.bodies().iter().map(|b| b.position).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_step_recovers_from_nan() {
        let mut w = world(1);
        w.insert(Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY);
        w.bodies_mut()[0].linear_velocity = Vec3::new(f32::NAN, 0.0, 0.0);
        w.bodies_mut()[0].angular_velocity = Vec3::splat(f32::INFINITY);
        w.step(SIM_DT);
        assert!(w.bodies()[0].is_finite());
        assert!(w.clamp_events() > 0);
    }

    #[test]
    fn test_step_caps_speed() {
        let mut w = world(1);
        w.insert(Vec3::new(0.0, 50.0, 0.0), Quat::IDENTITY);
        w.bodies_mut()[0].linear_velocity = Vec3::new(1.0e6, 0.0, 0.0);
        w.step(SIM_DT);
        let max = RollSettings::default().physics.max_linear_speed;
        assert!(w.bodies()[0].linear_velocity.length() <= max + 1e-3);
    }

    #[test]
    fn test_free_fall_follows_gravity() {
        let mut w = world(1);
        w.insert(Vec3::new(0.0, 100.0, 0.0), Quat::IDENTITY);
        for _ in 0..10 {
            w.step(SIM_DT);
        }
        let body = &w.bodies()[0];
        assert!(body.linear_velocity.y < 0.0);
        assert!(body.position.y < 100.0);
        assert_eq!(body.linear_velocity.x, 0.0);

        // Damping only removes speed, so the fall is at most free-fall speed
        let free_fall = w.gravity().y * 10.0 * SIM_DT;
        assert!(body.linear_velocity.y >= free_fall - 1e-3);
        assert!(body.linear_velocity.y < free_fall * 0.9);
    }

    #[test]
    fn test_resting_die_stays_put() {
        let mut w = world(1);
        let h = RollSettings::default().die.half_extent;
        w.insert(Vec3::new(0.0, h, 0.0), Quat::IDENTITY);
        for _ in 0..120 {
            w.step(SIM_DT);
        }
        let body = &w.bodies()[0];
        assert!((body.position.y - h).abs() < 0.02, "y = {}", body.position.y);
        assert!(w.kinetic_energy() < 1e-3);
        assert!((body.orientation * Vec3::Y).y > 0.99);
    }

    #[test]
    fn test_dropped_die_never_sinks() {
        let mut w = world(21);
        w.spawn(1, &SpawnSettings::default()).unwrap();
        for _ in 0..600 {
            w.step(SIM_DT);
            assert!(w.bodies()[0].lowest_point() > -1e-3);
        }
    }
}
