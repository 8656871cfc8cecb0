use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::debug;

use crate::{
    bridge::messages::{Planar2d, StampMsg},
    bridge::state::FusedOdometryState,
    nodes::{Node, StepResult},
    telemetry::{TelemetryError, TelemetryReceiver, TelemetryService, Timestamped},
    utils::capacity::Capacity,
};

/// How long a listener blocks before re-checking for a stop request.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Per-listener buffer depth. Only the newest value matters downstream, so a
/// shallow buffer that overwrites its oldest entries is the right shape.
const QUEUE_DEPTH: usize = 64;

/// Applies velocity fragments to the shared store. Never touches the pose or
/// stamp sub-records.
pub struct VelocityListener {
    rx: TelemetryReceiver<Planar2d>,
    state: Arc<FusedOdometryState>,
}

impl VelocityListener {
    pub fn new(
        telemetry: &TelemetryService,
        topic: &str,
        state: Arc<FusedOdometryState>,
    ) -> Result<Self, TelemetryError> {
        let rx = telemetry.subscribe(topic, Capacity::from(QUEUE_DEPTH))?;

        Ok(Self { rx, state })
    }
}

impl Node for VelocityListener {
    fn step(&mut self) -> Result<StepResult> {
        match self.rx.recv_timeout(POLL_TIMEOUT) {
            Ok(Timestamped(_, vel)) => {
                self.state.update_velocity(vel);
                Ok(StepResult::Continue)
            }
            Err(TelemetryError::Timeout) => Ok(StepResult::Continue),
            Err(TelemetryError::ClosedChannel) => {
                debug!("Velocity channel closed");
                Ok(StepResult::Stop)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Applies pose fragments to the shared store.
pub struct PoseListener {
    rx: TelemetryReceiver<Planar2d>,
    state: Arc<FusedOdometryState>,
}

impl PoseListener {
    pub fn new(
        telemetry: &TelemetryService,
        topic: &str,
        state: Arc<FusedOdometryState>,
    ) -> Result<Self, TelemetryError> {
        let rx = telemetry.subscribe(topic, Capacity::from(QUEUE_DEPTH))?;

        Ok(Self { rx, state })
    }
}

impl Node for PoseListener {
    fn step(&mut self) -> Result<StepResult> {
        match self.rx.recv_timeout(POLL_TIMEOUT) {
            Ok(Timestamped(_, pose)) => {
                self.state.update_pose(pose);
                Ok(StepResult::Continue)
            }
            Err(TelemetryError::Timeout) => Ok(StepResult::Continue),
            Err(TelemetryError::ClosedChannel) => {
                debug!("Pose channel closed");
                Ok(StepResult::Stop)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Applies timestamp fragments to the shared store. Last-write-wins: no
/// monotonicity check is performed.
pub struct StampListener {
    rx: TelemetryReceiver<StampMsg>,
    state: Arc<FusedOdometryState>,
}

impl StampListener {
    pub fn new(
        telemetry: &TelemetryService,
        topic: &str,
        state: Arc<FusedOdometryState>,
    ) -> Result<Self, TelemetryError> {
        let rx = telemetry.subscribe(topic, Capacity::from(QUEUE_DEPTH))?;

        Ok(Self { rx, state })
    }
}

impl Node for StampListener {
    fn step(&mut self) -> Result<StepResult> {
        match self.rx.recv_timeout(POLL_TIMEOUT) {
            Ok(Timestamped(_, msg)) => {
                self.state.update_stamp(msg.stamp);
                Ok(StepResult::Continue)
            }
            Err(TelemetryError::Timeout) => Ok(StepResult::Continue),
            Err(TelemetryError::ClosedChannel) => {
                debug!("Stamp channel closed");
                Ok(StepResult::Stop)
            }
            Err(e) => Err(e.into()),
        }
    }
}
