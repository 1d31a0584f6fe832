use anyhow::{Context, Result};
use clap::Parser;
use dead_reckoning::sim::SimulatedBase;
use dead_reckoning::{DistanceDriver, DriveConfig, DriveOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Drive a simulated base a fixed distance, monitoring its odometry
#[derive(Parser, Debug)]
#[command(name = "drive_distance", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Signed distance in meters (overrides the config)
    #[arg(short, long, allow_hyphen_values = true)]
    distance: Option<f64>,

    /// Speed in m/s (overrides the config)
    #[arg(short, long)]
    speed: Option<f64>,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => DriveConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DriveConfig::default(),
    };
    if let Some(distance) = args.distance {
        config.drive.distance_meters = distance;
    }
    if let Some(speed) = args.speed {
        config.drive.speed_meters_per_second = speed;
    }
    config.validate()?;

    let distance = config.drive.distance_meters;
    let speed = config.drive.speed_meters_per_second;
    info!(distance, speed, "drive requested");

    let base = Arc::new(SimulatedBase::spawn(
        config.driver.frames(),
        &config.sim,
        &config.pose_buffer,
    ));
    let mut driver = DistanceDriver::new(Arc::clone(&base), Arc::clone(&base), &config.driver);
    info!(frames = %driver.frames(), "monitoring odometry");
    let stop = driver.stop_token();

    // The control loop blocks, so keep it off the async workers
    let drive = tokio::task::spawn_blocking(move || driver.drive_forward(distance, speed));
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping the robot");
            stop.cancel();
        }
    });
    let outcome = drive.await.context("drive task failed")?;
    interrupt.abort();

    let pose = base.pose();
    base.shutdown();
    let report = outcome.context("drive failed")?;

    match report.outcome {
        DriveOutcome::Arrived => info!(
            travelled = report.travelled,
            polls = report.polls,
            commands = report.commands_sent,
            retries = report.transient_errors,
            "drive complete"
        ),
        DriveOutcome::Cancelled => warn!(travelled = report.travelled, "drive cancelled"),
    }
    if let Some(pose) = pose {
        info!(x = pose.x(), y = pose.y(), yaw = pose.yaw(), "final simulated pose");
    }
    Ok(())
}
