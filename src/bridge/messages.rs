use nalgebra::{UnitQuaternion, Vector3};

use crate::core::time::UtcInstant;

/// Planar triple carried by both the velocity and the pose inbound channels.
/// For a velocity fragment the fields are (vx, vy, omega_z); for a pose
/// fragment they are (x, y, heading).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Planar2d {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Planar2d {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }
}

/// Timestamp fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StampMsg {
    pub stamp: UtcInstant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub stamp: UtcInstant,
    pub frame_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMsg {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwistMsg {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

/// Composite outbound message: pose and twist of `child_frame_id` expressed
/// in the header frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Odometry {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: PoseMsg,
    pub twist: TwistMsg,
}

/// Rotation about the vertical axis by `heading` radians, as a unit
/// quaternion: (x: 0, y: 0, z: sin(heading/2), w: cos(heading/2)).
///
/// Total over all reals. Headings outside [-pi, pi] are fine as-is since
/// sine and cosine are periodic; normalizing here would change the numeric
/// output for no benefit.
pub fn quaternion_from_heading(heading: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(0.0, 0.0, heading)
}
