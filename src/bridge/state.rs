use std::sync::Mutex;

use crate::bridge::messages::Planar2d;
use crate::core::time::UtcInstant;

/// Last received velocity fragment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityFragment {
    pub x: f64,
    pub y: f64,
    pub angular_z: f64,
}

/// Last received pose fragment. `heading` is a signed angle in radians with
/// unconstrained range; it is stored and republished exactly as received.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseFragment {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

/// One coherent read of the store. Each field is internally consistent (it
/// came from a single update), but the three fields may stem from different
/// arrival times.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateSnapshot {
    pub velocity: VelocityFragment,
    pub pose: PoseFragment,
    pub stamp: UtcInstant,
}

/// Latest-known odometry state, fed by three independent input streams and
/// read by the republisher.
///
/// Each sub-record sits behind its own mutex and is replaced as a whole, so
/// a reader can never observe a half-applied update within one sub-record.
/// There is deliberately no atomicity across sub-records: the upstream
/// producer refreshes all three far faster than the republish period, so
/// cross-field staleness is negligible and not worth a global lock.
///
/// Starts out all-zero with an epoch stamp; ticks that fire before the first
/// fragments arrive publish these defaults as-is.
#[derive(Debug, Default)]
pub struct FusedOdometryState {
    velocity: Mutex<VelocityFragment>,
    pose: Mutex<PoseFragment>,
    stamp: Mutex<UtcInstant>,
}

impl FusedOdometryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_velocity(&self, v: Planar2d) {
        *self.velocity.lock().unwrap() = VelocityFragment {
            x: v.x,
            y: v.y,
            angular_z: v.theta,
        };
    }

    pub fn update_pose(&self, p: Planar2d) {
        *self.pose.lock().unwrap() = PoseFragment {
            x: p.x,
            y: p.y,
            heading: p.theta,
        };
    }

    /// Last-write-wins, even for stamps older than the stored one.
    pub fn update_stamp(&self, t: UtcInstant) {
        *self.stamp.lock().unwrap() = t;
    }

    /// The locks are taken one at a time, never nested, so no writer is ever
    /// blocked for longer than one sub-record copy.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            velocity: *self.velocity.lock().unwrap(),
            pose: *self.pose.lock().unwrap(),
            stamp: *self.stamp.lock().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn defaults_are_zero_and_epoch() {
        let state = FusedOdometryState::new();
        let snap = state.snapshot();

        assert_eq!(snap.velocity, VelocityFragment::default());
        assert_eq!(snap.pose, PoseFragment::default());
        assert!(snap.stamp.is_epoch());
    }

    #[test]
    fn updates_replace_whole_sub_record() {
        let state = FusedOdometryState::new();

        state.update_velocity(Planar2d::new(0.2, 0.0, 0.5));
        state.update_pose(Planar2d::new(1.5, -2.0, 0.3));

        let snap = state.snapshot();
        assert_eq!(
            snap.velocity,
            VelocityFragment {
                x: 0.2,
                y: 0.0,
                angular_z: 0.5
            }
        );
        assert_eq!(
            snap.pose,
            PoseFragment {
                x: 1.5,
                y: -2.0,
                heading: 0.3
            }
        );
    }

    #[test]
    fn sub_records_are_independent() {
        let state = FusedOdometryState::new();
        let stamp = UtcInstant::from_timestamp(42, 0).unwrap();

        state.update_velocity(Planar2d::new(1.0, 2.0, 3.0));
        state.update_stamp(stamp);
        let before = state.snapshot();

        state.update_pose(Planar2d::new(9.0, 9.0, 9.0));
        let after = state.snapshot();

        assert_eq!(after.velocity, before.velocity);
        assert_eq!(after.stamp, before.stamp);
        assert_ne!(after.pose, before.pose);
    }

    #[test]
    fn stale_stamp_still_wins() {
        let state = FusedOdometryState::new();

        state.update_stamp(UtcInstant::from_timestamp(100, 0).unwrap());
        state.update_stamp(UtcInstant::from_timestamp(50, 0).unwrap());

        assert_eq!(
            state.snapshot().stamp,
            UtcInstant::from_timestamp(50, 0).unwrap()
        );
    }

    /// Writers hammer the velocity and pose sub-records with triples whose
    /// three fields are equal; a concurrent reader must never observe a
    /// sub-record mixing two updates.
    #[test]
    fn concurrent_updates_never_tear() {
        let state = Arc::new(FusedOdometryState::new());
        let done = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..2)
            .map(|w| {
                let state = state.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut k = 0.0f64;
                    while !done.load(Ordering::Relaxed) {
                        if w == 0 {
                            state.update_velocity(Planar2d::new(k, k, k));
                        } else {
                            state.update_pose(Planar2d::new(k, k, k));
                        }
                        k += 1.0;
                    }
                })
            })
            .collect();

        for _ in 0..10_000 {
            let snap = state.snapshot();

            assert_eq!(snap.velocity.x, snap.velocity.y);
            assert_eq!(snap.velocity.x, snap.velocity.angular_z);
            assert_eq!(snap.pose.x, snap.pose.y);
            assert_eq!(snap.pose.x, snap.pose.heading);
        }

        done.store(true, Ordering::Relaxed);
        for w in writers {
            w.join().unwrap();
        }
    }
}
