//! End-to-end test: fragment producers -> listeners -> shared state ->
//! republisher -> composite odometry subscriber, all on real threads.

use std::time::{Duration, Instant};

use approx::assert_relative_eq;

use odom_bridge::{
    bridge::{self, BridgeConfig, messages::{Odometry, Planar2d, StampMsg}},
    core::time::UtcInstant,
    nodes::{NodeManager, ThreadedExecutor},
    parameters::ParameterMap,
    telemetry::{TelemetryService, Timestamped},
    utils::capacity::Capacity,
};

/// Wait until the republished stream reflects `pred`, or fail after a
/// generous deadline. The republisher ticks regardless of input, so stale
/// messages may precede the one we are waiting for.
fn wait_for(
    sub: &odom_bridge::telemetry::TelemetryReceiver<Odometry>,
    pred: impl Fn(&Odometry) -> bool,
) -> Odometry {
    let deadline = Instant::now() + Duration::from_secs(5);

    while Instant::now() < deadline {
        if let Ok(Timestamped(_, msg)) = sub.recv_timeout(Duration::from_millis(100))
            && pred(&msg)
        {
            return msg;
        }
    }

    panic!("Timed out waiting for a matching odometry message");
}

#[test]
fn fragments_are_fused_and_republished() {
    let ts = TelemetryService::default();
    let cfg = BridgeConfig {
        publish_rate_hz: 200.0,
        ..Default::default()
    };

    let sub = ts
        .subscribe::<Odometry>(&cfg.odom_topic, Capacity::Unbounded)
        .unwrap();

    let mut nm = NodeManager::new(ts.clone(), ParameterMap::default());
    bridge::register_nodes(&mut nm, &cfg).unwrap();

    let exec = ThreadedExecutor::run(nm);
    let token = exec.shutdown_token();

    // Before any fragment arrives the bridge publishes the defaults.
    let msg = wait_for(&sub, |_| true);
    assert!(msg.header.stamp.is_epoch());
    assert_eq!(msg.header.frame_id, "odom");
    assert_eq!(msg.child_frame_id, "base_link");
    assert_eq!(msg.pose.position.x, 0.0);
    assert_relative_eq!(msg.pose.orientation.w, 1.0);

    let tx_vel = ts.publish::<Planar2d>(&cfg.velocity_topic).unwrap();
    let tx_pose = ts.publish::<Planar2d>(&cfg.pose_topic).unwrap();
    let tx_stamp = ts.publish::<StampMsg>(&cfg.stamp_topic).unwrap();

    let stamp = UtcInstant::from_timestamp(1234, 0).unwrap();
    let now = UtcInstant::now();

    tx_vel.send(now, Planar2d::new(0.2, 0.0, 0.5));
    tx_pose.send(now, Planar2d::new(1.5, -2.0, 0.3));
    tx_stamp.send(now, StampMsg { stamp });

    let msg = wait_for(&sub, |m| {
        m.pose.position.x == 1.5 && m.twist.linear.x == 0.2 && m.header.stamp == stamp
    });

    assert_eq!(msg.pose.position.y, -2.0);
    assert_eq!(msg.pose.position.z, 0.0);
    assert_relative_eq!(msg.pose.orientation.k, (0.3f64 / 2.0).sin(), epsilon = 1e-12);
    assert_relative_eq!(msg.pose.orientation.w, (0.3f64 / 2.0).cos(), epsilon = 1e-12);
    assert_eq!(msg.twist.linear.y, 0.0);
    assert_eq!(msg.twist.angular.z, 0.5);

    // A later pose fragment must not disturb velocity or stamp.
    tx_pose.send(UtcInstant::now(), Planar2d::new(9.9, 9.9, 0.0));

    let msg = wait_for(&sub, |m| m.pose.position.x == 9.9);
    assert_eq!(msg.twist.linear.x, 0.2);
    assert_eq!(msg.twist.angular.z, 0.5);
    assert_eq!(msg.header.stamp, stamp);

    token.request_stop();
    exec.join().unwrap();
}

#[test]
fn shutdown_is_clean_when_idle() {
    let ts = TelemetryService::default();
    let cfg = BridgeConfig {
        publish_rate_hz: 100.0,
        ..Default::default()
    };

    let mut nm = NodeManager::new(ts.clone(), ParameterMap::default());
    bridge::register_nodes(&mut nm, &cfg).unwrap();

    let exec = ThreadedExecutor::run(nm);
    let token = exec.shutdown_token();

    std::thread::sleep(Duration::from_millis(50));
    token.request_stop();

    exec.join().unwrap();
}
