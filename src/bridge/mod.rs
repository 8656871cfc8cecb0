//! The bridge core: a shared latest-known odometry store, three fragment
//! listeners feeding it, and a fixed-rate republisher draining it into one
//! composite odometry stream.

pub mod messages;
pub mod state;

mod listeners;
mod republisher;

use std::sync::Arc;

use thiserror::Error;

pub use listeners::{PoseListener, StampListener, VelocityListener};
pub use republisher::{Republisher, fuse};

use crate::{
    bridge::state::FusedOdometryState,
    nodes::{self, NodeManager},
    parameters::{self, ParameterMap},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Parameter(#[from] parameters::Error),

    #[error("publish_rate_hz must be positive, got {0}")]
    NonPositiveRate(f64),
}

/// Bridge configuration. Every field has a default, so an empty parameter
/// file yields a working 10 Hz bridge with the conventional frame labels.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub publish_rate_hz: f64,
    pub parent_frame: String,
    pub child_frame: String,
    pub velocity_topic: String,
    pub pose_topic: String,
    pub stamp_topic: String,
    pub odom_topic: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            publish_rate_hz: 10.0,
            parent_frame: "odom".to_string(),
            child_frame: "base_link".to_string(),
            velocity_topic: "/odom/vel".to_string(),
            pose_topic: "/odom/pos".to_string(),
            stamp_topic: "/odom/time".to_string(),
            odom_topic: "/odom".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Read the `bridge` section of a parameter tree; missing keys keep
    /// their defaults.
    pub fn from_params(params: &ParameterMap) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cfg = Self {
            publish_rate_hz: float_or(params, "bridge.publish_rate_hz", defaults.publish_rate_hz)?,
            parent_frame: string_or(params, "bridge.parent_frame", &defaults.parent_frame)?,
            child_frame: string_or(params, "bridge.child_frame", &defaults.child_frame)?,
            velocity_topic: string_or(params, "bridge.velocity_topic", &defaults.velocity_topic)?,
            pose_topic: string_or(params, "bridge.pose_topic", &defaults.pose_topic)?,
            stamp_topic: string_or(params, "bridge.stamp_topic", &defaults.stamp_topic)?,
            odom_topic: string_or(params, "bridge.odom_topic", &defaults.odom_topic)?,
        };

        if cfg.publish_rate_hz <= 0.0 {
            return Err(ConfigError::NonPositiveRate(cfg.publish_rate_hz));
        }

        Ok(cfg)
    }
}

fn float_or(params: &ParameterMap, path: &str, default: f64) -> Result<f64, parameters::Error> {
    match params.get_param(path) {
        Ok(p) => p.value_float(),
        Err(parameters::Error::NotFound { .. }) => Ok(default),
        Err(e) => Err(e),
    }
}

fn string_or(
    params: &ParameterMap,
    path: &str,
    default: &str,
) -> Result<String, parameters::Error> {
    match params.get_param(path) {
        Ok(p) => p.value_string(),
        Err(parameters::Error::NotFound { .. }) => Ok(default.to_string()),
        Err(e) => Err(e),
    }
}

/// Build the shared state and register the four bridge nodes: one listener
/// per inbound fragment channel plus the republisher.
pub fn register_nodes(nm: &mut NodeManager, cfg: &BridgeConfig) -> Result<(), nodes::Error> {
    let state = Arc::new(FusedOdometryState::new());

    {
        let state = state.clone();
        let topic = cfg.velocity_topic.clone();
        nm.add_node("velocity_listener", move |ctx| {
            Ok(Box::new(VelocityListener::new(
                ctx.telemetry(),
                &topic,
                state,
            )?))
        })?;
    }

    {
        let state = state.clone();
        let topic = cfg.pose_topic.clone();
        nm.add_node("pose_listener", move |ctx| {
            Ok(Box::new(PoseListener::new(ctx.telemetry(), &topic, state)?))
        })?;
    }

    {
        let state = state.clone();
        let topic = cfg.stamp_topic.clone();
        nm.add_node("stamp_listener", move |ctx| {
            Ok(Box::new(StampListener::new(ctx.telemetry(), &topic, state)?))
        })?;
    }

    let cfg = cfg.clone();
    nm.add_node("republisher", move |ctx| {
        Ok(Box::new(Republisher::new(
            ctx.telemetry(),
            &cfg.odom_topic,
            cfg.publish_rate_hz,
            &cfg.parent_frame,
            &cfg.child_frame,
            state,
        )?))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::parse_string;

    #[test]
    fn config_defaults() {
        let cfg = BridgeConfig::from_params(&ParameterMap::default()).unwrap();
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn config_overrides() {
        let params = parse_string(
            r#"
            [bridge]
            publish_rate_hz = { val = 50.0, type = "float" }
            parent_frame = { val = "map", type = "str" }
            odom_topic = { val = "/fused/odom", type = "str" }
            "#,
        )
        .unwrap();

        let cfg = BridgeConfig::from_params(&params).unwrap();

        assert_eq!(cfg.publish_rate_hz, 50.0);
        assert_eq!(cfg.parent_frame, "map");
        assert_eq!(cfg.odom_topic, "/fused/odom");
        // Untouched keys keep their defaults.
        assert_eq!(cfg.child_frame, "base_link");
        assert_eq!(cfg.velocity_topic, "/odom/vel");
    }

    #[test]
    fn config_rejects_non_positive_rate() {
        let params = parse_string(
            r#"
            [bridge]
            publish_rate_hz = { val = 0.0, type = "float" }
            "#,
        )
        .unwrap();

        assert!(matches!(
            BridgeConfig::from_params(&params),
            Err(ConfigError::NonPositiveRate(_))
        ));
    }

    #[test]
    fn config_rejects_wrong_type() {
        let params = parse_string(
            r#"
            [bridge]
            publish_rate_hz = { val = "fast", type = "str" }
            "#,
        )
        .unwrap();

        assert!(matches!(
            BridgeConfig::from_params(&params),
            Err(ConfigError::Parameter(parameters::Error::BadCast { .. }))
        ));
    }
}
