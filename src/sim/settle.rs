//! Settlement detection
//!
//! A per-sample predicate over the current velocities. It keeps no history;
//! the session applies it on its own cadence and bounds the total wait.

use super::body::RigidBody;
use crate::settings::SettleSettings;

/// Decides whether a population of bodies has come to rest
pub trait SettleDetector {
    fn is_settled(&self, bodies: &[RigidBody]) -> bool;
}

/// Every body below fixed linear and angular speed thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityThreshold {
    pub linear_epsilon: f32,
    pub angular_epsilon: f32,
}

impl VelocityThreshold {
    pub fn new(linear_epsilon: f32, angular_epsilon: f32) -> Self {
        Self {
            linear_epsilon,
            angular_epsilon,
        }
    }

    pub fn from_settings(settings: &SettleSettings) -> Self {
        Self::new(settings.linear_epsilon, settings.angular_epsilon)
    }

    /// Whether a single body is below both thresholds
    #[inline]
    pub fn is_resting(&self, body: &RigidBody) -> bool {
        body.linear_velocity.length() <= self.linear_epsilon
            && body.angular_velocity.length() <= self.angular_epsilon
    }

    /// Per-body rest judgement, index-aligned with `bodies`
    pub fn resting_mask(&self, bodies: &[RigidBody]) -> Vec<bool> {
        bodies.iter().map(|b| self.is_resting(b)).collect()
    }
}

impl Default for VelocityThreshold {
    fn default() -> Self {
        Self::from_settings(&SettleSettings::default())
    }
}

impl SettleDetector for VelocityThreshold {
    fn is_settled(&self, bodies: &[RigidBody]) -> bool {
        bodies.iter().all(|b| self.is_resting(b))
    }
}

impl<F> SettleDetector for F
where
    F: Fn(&[RigidBody]) -> bool,
{
    fn is_settled(&self, bodies: &[RigidBody]) -> bool {
        self(bodies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn body_with(v: Vec3, w: Vec3) -> RigidBody {
        let mut body = RigidBody::new(1, Vec3::new(0.0, 0.5, 0.0), 0.5, 1.0);
        body.linear_velocity = v;
        body.angular_velocity = w;
        body
    }

    #[test]
    fn test_still_bodies_are_settled() {
        let detector = VelocityThreshold::default();
        let bodies = vec![body_with(Vec3::ZERO, Vec3::ZERO); 3];
        assert!(detector.is_settled(&bodies));
    }

    #[test]
    fn test_one_moving_body_blocks_settlement() {
        let detector = VelocityThreshold::new(0.1, 0.2);
        let bodies = vec![
            body_with(Vec3::ZERO, Vec3::ZERO),
            body_with(Vec3::ZERO, Vec3::new(0.0, 0.5, 0.0)),
        ];
        assert!(!detector.is_settled(&bodies));
        assert_eq!(detector.resting_mask(&bodies), vec![true, false]);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let detector = VelocityThreshold::new(0.5, 0.25);
        let bodies = vec![body_with(Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.0, 0.0, 0.25))];
        assert!(detector.is_settled(&bodies));
    }

    #[test]
    fn test_same_snapshot_same_answer() {
        let detector = VelocityThreshold::default();
        let bodies = vec![
            body_with(Vec3::new(0.01, 0.0, 0.0), Vec3::ZERO),
            body_with(Vec3::ZERO, Vec3::new(0.05, 0.0, 0.0)),
        ];
        let first = detector.is_settled(&bodies);
        assert!(first);
        for _ in 0..5 {
            assert_eq!(detector.is_settled(&bodies), first);
        }
    }

    #[test]
    fn test_closure_detector() {
        let never = |_: &[RigidBody]| false;
        assert!(!never.is_settled(&[]));
    }
}
