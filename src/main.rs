use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use odom_bridge::{
    bridge::{self, BridgeConfig},
    nodes::{NodeManager, ThreadedExecutor},
    parameters,
    telemetry::TelemetryService,
};

/// Fuses partial odometry fragments into a composite odometry stream.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Path to the parameter file
    #[arg(short, long, default_value = "config/params.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }
    pretty_env_logger::init();

    let args = Args::parse();

    info!("Reading parameters from '{}'", args.config.display());
    let params_toml = fs::read_to_string(&args.config)
        .with_context(|| format!("Cannot read '{}'", args.config.display()))?;
    let params = parameters::parse_string(&params_toml)?;

    let cfg = BridgeConfig::from_params(&params)?;
    info!(
        "Fusing '{}' + '{}' + '{}' -> '{}' at {} Hz",
        cfg.velocity_topic, cfg.pose_topic, cfg.stamp_topic, cfg.odom_topic, cfg.publish_rate_hz
    );

    let ts = TelemetryService::default();
    let mut nm = NodeManager::new(ts.clone(), params);
    bridge::register_nodes(&mut nm, &cfg)?;

    let exec = ThreadedExecutor::run(nm);

    let token = exec.shutdown_token();
    ctrlc::set_handler(move || {
        info!("Shutdown requested");
        token.request_stop();
    })?;

    exec.join()?;

    info!("Bridge stopped");

    Ok(())
}
