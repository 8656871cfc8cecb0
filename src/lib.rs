//! Protocol-translation bridge for split odometry streams.
//!
//! A resource-constrained upstream producer cannot assemble a full composite
//! odometry message, so it emits three partial fragments on separate
//! channels: a velocity triple, a planar pose triple and a bare timestamp.
//! This crate fuses the latest value of each fragment into one shared state
//! and republishes the composite odometry message at a fixed rate.
//!
//! The moving parts:
//!
//! * [`telemetry::TelemetryService`] — typed in-process pub/sub bus.
//! * [`bridge::state::FusedOdometryState`] — the shared latest-known state,
//!   one lock per sub-record.
//! * [`bridge`] listeners and [`bridge::Republisher`] — the nodes wired
//!   around that state.
//! * [`nodes::ThreadedExecutor`] — one thread per node with cooperative
//!   shutdown.

pub mod bridge;
pub mod core;
pub mod nodes;
pub mod parameters;
pub mod telemetry;
pub mod utils;
