//! Read-only body snapshots for presentation
//!
//! The simulation is the only writer. After every completed step it publishes
//! a fresh, immutable slice; readers clone the current `Arc` and never see a
//! half-updated body.

use std::sync::{Arc, RwLock};

use bytemuck::{Pod, Zeroable};

use super::body::RigidBody;

/// Pose of one die, laid out for direct GPU upload
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BodySnapshot {
    pub position: [f32; 3],
    /// 1.0 when the body is below the rest thresholds
    pub at_rest: f32,
    /// Quaternion as x, y, z, w
    pub orientation: [f32; 4],
}

impl BodySnapshot {
    pub fn from_body(body: &RigidBody, at_rest: bool) -> Self {
        Self {
            position: body.position.to_array(),
            at_rest: if at_rest { 1.0 } else { 0.0 },
            orientation: body.orientation.to_array(),
        }
    }
}

/// Shared handle to the latest published snapshot
#[derive(Debug, Clone, Default)]
pub struct SnapshotFeed {
    latest: Arc<RwLock<Arc<[BodySnapshot]>>>,
}

impl SnapshotFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Arc<[BodySnapshot]> {
        match self.latest.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the published snapshot
    pub fn publish(&self, snapshot: Vec<BodySnapshot>) {
        let snapshot: Arc<[BodySnapshot]> = snapshot.into();
        match self.latest.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    pub fn clear(&self) {
        self.publish(Vec::new());
    }
}

/// Flatten a snapshot to raw floats (8 per body)
pub fn as_floats(snapshot: &[BodySnapshot]) -> &[f32] {
    bytemuck::cast_slice(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn test_readers_keep_old_snapshot_after_publish() {
        let feed = SnapshotFeed::new();
        let body = RigidBody::new(1, Vec3::new(1.0, 2.0, 3.0), 0.5, 1.0);
        feed.publish(vec![BodySnapshot::from_body(&body, false)]);

        let reader = feed.clone();
        let before = reader.latest();
        feed.publish(Vec::new());

        assert_eq!(before.len(), 1);
        assert_eq!(before[0].position, [1.0, 2.0, 3.0]);
        assert!(reader.latest().is_empty());
    }

    #[test]
    fn test_snapshot_flattens_to_floats() {
        let mut body = RigidBody::new(1, Vec3::new(1.0, 2.0, 3.0), 0.5, 1.0);
        body.orientation = Quat::from_xyzw(0.0, 0.0, 0.0, 1.0);
        let snaps = [BodySnapshot::from_body(&body, true)];
        assert_eq!(
            as_floats(&snaps),
            &[1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_feed_is_shareable_across_threads() {
        let feed = SnapshotFeed::new();
        let reader = feed.clone();
        let body = RigidBody::new(1, Vec3::ZERO, 0.5, 1.0);
        feed.publish(vec![BodySnapshot::from_body(&body, false); 4]);
        let len = std::thread::spawn(move || reader.latest().len())
            .join()
            .unwrap();
        assert_eq!(len, 4);
    }
}
