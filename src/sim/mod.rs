//! Simulated differential drive base
//!
//! Integrates the latest velocity command into an odometry estimate on a
//! background thread and serves it through a [`PoseBuffer`], so the driver
//! can run without hardware or middleware.

use crate::actuation::{CommandSink, LatestCommand};
use crate::common::{FramePair, Pose, VelocityCommand};
use crate::config::{PoseBufferConfig, SimConfig};
use crate::error::PoseError;
use crate::perception::buffer::PoseBuffer;
use crate::perception::localization::OdometryIntegrator;
use crate::perception::{PoseSource, PoseTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A robot base that exists only in memory
pub struct SimulatedBase {
    buffer: PoseBuffer,
    command: Arc<LatestCommand>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropout_probability: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedBase {
    /// Start the odometry thread
    pub fn spawn(frames: FramePair, sim: &SimConfig, buffer_config: &PoseBufferConfig) -> Self {
        let buffer = PoseBuffer::new(frames, buffer_config.history, buffer_config.stale_after());
        let command = Arc::new(LatestCommand::new(sim.command_timeout()));
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let buffer = buffer.clone();
            let command = Arc::clone(&command);
            let running = Arc::clone(&running);
            let period = sim.tick_period();
            let startup_delay = sim.startup_delay();
            thread::spawn(move || run_odometry(buffer, command, running, period, startup_delay))
        };

        let rng = match sim.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        tracing::info!(
            rate_hz = sim.odom_rate_hz,
            dropout = sim.dropout_probability,
            "simulated base started"
        );

        SimulatedBase {
            buffer,
            command,
            running,
            worker: Mutex::new(Some(worker)),
            dropout_probability: dropout_probability(sim.dropout_probability),
            rng: Mutex::new(rng),
        }
    }

    pub fn pose_buffer(&self) -> &PoseBuffer {
        &self.buffer
    }

    /// Command currently applied to the wheels
    pub fn applied_command(&self) -> VelocityCommand {
        self.command.current()
    }

    /// Newest simulated pose, if any
    pub fn pose(&self) -> Option<Pose> {
        self.buffer.newest().map(|sample| sample.pose)
    }

    /// Stop the odometry thread and disconnect the pose buffer
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!("odometry thread panicked");
            }
        }
        self.buffer.close();
        tracing::info!("simulated base stopped");
    }

    fn drop_out(&self) -> bool {
        if self.dropout_probability <= 0.0 {
            return false;
        }
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_bool(self.dropout_probability)
    }
}

/// Clamp to a usable probability; NaN disables dropouts
fn dropout_probability(requested: f64) -> f64 {
    if requested.is_nan() {
        0.0
    } else {
        requested.clamp(0.0, 1.0)
    }
}

fn run_odometry(
    buffer: PoseBuffer,
    command: Arc<LatestCommand>,
    running: Arc<AtomicBool>,
    period: Duration,
    startup_delay: Duration,
) {
    let epoch = Instant::now();
    while running.load(Ordering::SeqCst) && epoch.elapsed() < startup_delay {
        thread::sleep(period.min(startup_delay));
    }

    let mut integrator = OdometryIntegrator::new();
    let mut last_tick = Instant::now();
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        let pose = integrator.integrate(command.current(), now - last_tick);
        last_tick = now;
        buffer.insert(now - epoch, pose);
        thread::sleep(period);
    }
}

impl PoseSource for SimulatedBase {
    fn wait_until_ready(&self, frames: &FramePair, timeout: Duration) -> bool {
        self.buffer.wait_until_ready(frames, timeout)
    }

    fn relative_pose(&self, frames: &FramePair, at: PoseTime) -> Result<Pose, PoseError> {
        if self.drop_out() {
            return Err(PoseError::Connectivity("simulated odometry dropout".into()));
        }
        self.buffer.relative_pose(frames, at)
    }
}

impl CommandSink for SimulatedBase {
    fn publish(&self, command: VelocityCommand) {
        self.command.publish(command);
    }
}

impl Drop for SimulatedBase {
    fn drop(&mut self) {
        self.shutdown();
    }
}
