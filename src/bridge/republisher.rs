use std::sync::Arc;

use anyhow::Result;
use nalgebra::Vector3;

use crate::{
    bridge::messages::{Header, Odometry, PoseMsg, TwistMsg, quaternion_from_heading},
    bridge::state::{FusedOdometryState, StateSnapshot},
    core::time::{Rate, UtcInstant},
    nodes::{Node, StepResult},
    telemetry::{TelemetryError, TelemetrySender, TelemetryService},
};

/// Assemble the composite message from one snapshot. Pure: the same snapshot
/// and frame labels always yield the same message.
pub fn fuse(snapshot: &StateSnapshot, parent_frame: &str, child_frame: &str) -> Odometry {
    Odometry {
        header: Header {
            stamp: snapshot.stamp,
            frame_id: parent_frame.to_string(),
        },
        child_frame_id: child_frame.to_string(),
        pose: PoseMsg {
            position: Vector3::new(snapshot.pose.x, snapshot.pose.y, 0.0),
            orientation: quaternion_from_heading(snapshot.pose.heading),
        },
        twist: TwistMsg {
            linear: Vector3::new(snapshot.velocity.x, snapshot.velocity.y, 0.0),
            angular: Vector3::new(0.0, 0.0, snapshot.velocity.angular_z),
        },
    }
}

/// Fixed-rate fusion-and-emit loop. Every tick reads the store, assembles
/// one composite message and publishes it, whether or not anything arrived
/// since the previous tick; republishing stale data is expected behavior.
pub struct Republisher {
    state: Arc<FusedOdometryState>,
    tx_odom: TelemetrySender<Odometry>,
    rate: Rate,
    parent_frame: String,
    child_frame: String,
}

impl Republisher {
    pub fn new(
        telemetry: &TelemetryService,
        topic: &str,
        rate_hz: f64,
        parent_frame: &str,
        child_frame: &str,
        state: Arc<FusedOdometryState>,
    ) -> Result<Self, TelemetryError> {
        let tx_odom = telemetry.publish(topic)?;

        Ok(Self {
            state,
            tx_odom,
            rate: Rate::from_hz(rate_hz),
            parent_frame: parent_frame.to_string(),
            child_frame: child_frame.to_string(),
        })
    }
}

impl Node for Republisher {
    fn step(&mut self) -> Result<StepResult> {
        let snapshot = self.state.snapshot();
        let msg = fuse(&snapshot, &self.parent_frame, &self.child_frame);

        // Fire-and-forget: delivery to subscribers is the bus's concern.
        self.tx_odom.send(UtcInstant::now(), msg);

        self.rate.sleep();

        Ok(StepResult::Continue)
    }
}
