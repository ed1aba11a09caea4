//! Contact generation and impulse resolution for cubes
//!
//! Contacts come from two sources: cube corners against the ground plane
//! (y = 0), and cube corners inside another cube. Ground contacts are
//! speculative: a corner still above the plane that will reach it within the
//! step gets a contact that only allows it to close the remaining gap.
//!
//! Every contact is solved with sequential impulses. Accumulated normal
//! impulses are clamped to push only; friction is clamped to the Coulomb cone
//! of the current normal impulse.

use glam::Vec3;

use super::body::RigidBody;

/// Friction/restitution pair for one kind of contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaterial {
    pub friction: f32,
    pub restitution: f32,
}

/// What a body is touching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactTarget {
    Ground,
    Body(usize),
}

/// A single contact point
#[derive(Debug, Clone)]
pub struct Contact {
    /// Index of the body pushed along `normal`
    pub a: usize,
    /// The other side (pushed along `-normal`)
    pub b: ContactTarget,
    /// Contact point in world space
    pub point: Vec3,
    /// Unit normal pointing from `b` toward `a`
    pub normal: Vec3,
    /// Penetration depth (negative while still separated)
    pub depth: f32,
    pub material: ContactMaterial,
    /// Desired separating speed from restitution
    bounce: f32,
    normal_impulse: f32,
    tangent_impulse: Vec3,
}

impl Contact {
    pub fn new(
        a: usize,
        b: ContactTarget,
        point: Vec3,
        normal: Vec3,
        depth: f32,
        material: ContactMaterial,
    ) -> Self {
        Self {
            a,
            b,
            point,
            normal,
            depth,
            material,
            bounce: 0.0,
            normal_impulse: 0.0,
            tangent_impulse: Vec3::ZERO,
        }
    }

    /// Total normal impulse applied so far this step
    pub fn normal_impulse(&self) -> f32 {
        self.normal_impulse
    }
}

/// Collect ground contacts for one body: every corner within `slop` of the
/// plane, or close enough to reach it during the next `dt`.
pub fn ground_contacts(
    index: usize,
    body: &RigidBody,
    slop: f32,
    dt: f32,
    material: ContactMaterial,
    out: &mut Vec<Contact>,
) {
    for corner in body.corners() {
        let falling = -body.velocity_at(corner - body.position).y;
        if corner.y < slop + falling.max(0.0) * dt {
            out.push(Contact::new(
                index,
                ContactTarget::Ground,
                corner,
                Vec3::Y,
                -corner.y,
                material,
            ));
        }
    }
}

/// Collect contacts between two cubes.
///
/// Corners of each cube found inside the other produce a contact on the
/// face pointing at the other cube's centre. Deep overlaps that miss every
/// corner (edge crossing edge) fall back to a single contact along the line
/// between centres.
pub fn pair_contacts(
    ia: usize,
    a: &RigidBody,
    ib: usize,
    b: &RigidBody,
    slop: f32,
    material: ContactMaterial,
    out: &mut Vec<Contact>,
) {
    let offset = a.position - b.position;
    let dist = offset.length();
    // Circumscribed spheres
    let reach = (a.half_extent + b.half_extent) * 3.0_f32.sqrt();
    if dist > reach {
        return;
    }

    let before = out.len();
    corners_inside(ia, a, ib, b, slop, material, out);
    corners_inside(ib, b, ia, a, slop, material, out);

    if out.len() == before {
        // Inscribed spheres overlap: definitely intersecting
        let inner = a.half_extent + b.half_extent;
        if dist < inner {
            let normal = if dist > 1e-6 { offset / dist } else { Vec3::Y };
            out.push(Contact::new(
                ia,
                ContactTarget::Body(ib),
                b.position + offset * 0.5,
                normal,
                inner - dist,
                material,
            ));
        }
    }
}

/// Contacts for corners of `host` that sit inside `other`.
///
/// Every corner is pushed out through the face of `other` that faces the
/// centre of `host`. The resulting contact pushes `other` away from `host`,
/// so `other` is the `a` side and `host` the `b` side.
fn corners_inside(
    i_host: usize,
    host: &RigidBody,
    i_other: usize,
    other: &RigidBody,
    slop: f32,
    material: ContactMaterial,
    out: &mut Vec<Contact>,
) {
    let h = other.half_extent + slop;

    // Face of `other` that looks toward `host`
    let toward = other.to_local(host.position);
    let abs_toward = toward.abs();
    let axis = if abs_toward.x >= abs_toward.y && abs_toward.x >= abs_toward.z {
        Vec3::X * toward.x.signum()
    } else if abs_toward.y >= abs_toward.z {
        Vec3::Y * toward.y.signum()
    } else {
        Vec3::Z * toward.z.signum()
    };

    for corner in host.corners() {
        let local = other.to_local(corner);
        let abs = local.abs();
        if abs.x >= h || abs.y >= h || abs.z >= h {
            continue;
        }
        let depth = other.half_extent - local.dot(axis);

        // Face normal points out toward `host`; `other` is pushed the other way
        let face_normal = other.orientation * axis;
        out.push(Contact::new(
            i_other,
            ContactTarget::Body(i_host),
            corner,
            -face_normal,
            depth,
            material,
        ));
    }
}

fn pair_mut(bodies: &mut [RigidBody], a: usize, b: usize) -> (&mut RigidBody, &mut RigidBody) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = bodies.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = bodies.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

/// Relative velocity of `a` with respect to `b` at the contact point
fn relative_velocity(bodies: &[RigidBody], c: &Contact) -> Vec3 {
    let a = &bodies[c.a];
    let va = a.velocity_at(c.point - a.position);
    match c.b {
        ContactTarget::Ground => va,
        ContactTarget::Body(ib) => {
            let b = &bodies[ib];
            va - b.velocity_at(c.point - b.position)
        }
    }
}

/// Inverse effective mass along `dir`
fn effective_inv_mass(bodies: &[RigidBody], c: &Contact, dir: Vec3) -> f32 {
    let a = &bodies[c.a];
    let ra = c.point - a.position;
    let mut k = a.inv_mass() + a.inv_inertia() * ra.cross(dir).length_squared();
    if let ContactTarget::Body(ib) = c.b {
        let b = &bodies[ib];
        let rb = c.point - b.position;
        k += b.inv_mass() + b.inv_inertia() * rb.cross(dir).length_squared();
    }
    k
}

fn apply(bodies: &mut [RigidBody], c: &Contact, impulse: Vec3) {
    match c.b {
        ContactTarget::Ground => {
            let a = &mut bodies[c.a];
            let ra = c.point - a.position;
            a.apply_impulse(impulse, ra);
        }
        ContactTarget::Body(ib) => {
            let (a, b) = pair_mut(bodies, c.a, ib);
            let ra = c.point - a.position;
            let rb = c.point - b.position;
            a.apply_impulse(impulse, ra);
            b.apply_impulse(-impulse, rb);
        }
    }
}

/// Fix each contact's target separating speed from pre-solve velocities.
///
/// Fast impacts bounce; separated contacts may close their gap this step;
/// everything else is held at zero approach speed.
pub fn prepare_contacts(
    bodies: &[RigidBody],
    contacts: &mut [Contact],
    restitution_threshold: f32,
    slop: f32,
    dt: f32,
) {
    for c in contacts.iter_mut() {
        let vn = relative_velocity(bodies, c).dot(c.normal);
        let gap = -c.depth;
        c.bounce = if vn < -restitution_threshold {
            -c.material.restitution * vn
        } else if gap > slop {
            -(gap - slop) / dt
        } else {
            0.0
        };
        c.normal_impulse = 0.0;
        c.tangent_impulse = Vec3::ZERO;
    }
}

/// Run `iterations` passes of sequential impulses over all contacts
pub fn solve_contacts(bodies: &mut [RigidBody], contacts: &mut [Contact], iterations: u32) {
    for _ in 0..iterations {
        for c in contacts.iter_mut() {
            // Normal
            let vrel = relative_velocity(bodies, c);
            let vn = vrel.dot(c.normal);
            let k = effective_inv_mass(bodies, c, c.normal);
            if k <= f32::EPSILON {
                continue;
            }
            let lambda = (c.bounce - vn) / k;
            let total = (c.normal_impulse + lambda).max(0.0);
            let applied = total - c.normal_impulse;
            c.normal_impulse = total;
            if applied != 0.0 {
                apply(bodies, c, c.normal * applied);
            }

            // Friction
            let vrel = relative_velocity(bodies, c);
            let vt = vrel - c.normal * vrel.dot(c.normal);
            let speed = vt.length();
            if speed <= 1e-6 {
                continue;
            }
            let t = vt / speed;
            let kt = effective_inv_mass(bodies, c, t);
            if kt <= f32::EPSILON {
                continue;
            }
            let max_friction = c.material.friction * c.normal_impulse;
            let total = (c.tangent_impulse - t * (speed / kt)).clamp_length_max(max_friction);
            let applied = total - c.tangent_impulse;
            c.tangent_impulse = total;
            apply(bodies, c, applied);
        }
    }
}

/// Push overlapping bodies apart along their contact normals.
///
/// Only positions move; velocities are untouched so no energy is injected.
pub fn separate_bodies(bodies: &mut [RigidBody], contacts: &[Contact], slop: f32, percent: f32) {
    for c in contacts {
        let ContactTarget::Body(ib) = c.b else {
            continue;
        };
        let excess = c.depth - slop;
        if excess <= 0.0 {
            continue;
        }
        let (a, b) = pair_mut(bodies, c.a, ib);
        let total_inv = a.inv_mass() + b.inv_mass();
        let correction = c.normal * (excess * percent / total_inv);
        a.position += correction * a.inv_mass();
        b.position -= correction * b.inv_mass();
    }
}

/// Lift a body so no corner is below the ground plane
pub fn lift_out_of_ground(body: &mut RigidBody) {
    let lowest = body.lowest_point();
    if lowest < 0.0 {
        body.position.y -= lowest;
    }
}
