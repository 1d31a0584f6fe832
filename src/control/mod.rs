//! Closed-loop straight-line driving on odometry
pub mod cancel;
pub mod clock;
pub mod controllers;
pub mod retry;
pub mod session;

use self::cancel::StopToken;
use self::clock::{Clock, SystemClock};
use self::controllers::StraightLineController;
use self::retry::{RetryWindow, TransientRetryPolicy};
use self::session::{DriveOutcome, DriveReport, DriveRequest, DriveSession, DriveState};
use crate::actuation::CommandSink;
use crate::common::{FramePair, Pose};
use crate::config::DriverConfig;
use crate::error::DriveError;
use crate::perception::{PoseSource, PoseTime};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Drives the robot a signed distance along its heading by polling its pose
/// estimate and commanding a constant velocity until the distance is covered.
///
/// Every session that sent a velocity command ends with a zero command,
/// whether it arrived, was cancelled or failed.
pub struct DistanceDriver<P, S, C = SystemClock> {
    pose_source: P,
    command_sink: S,
    clock: C,
    frames: FramePair,
    poll_interval: Duration,
    readiness_timeout: Duration,
    retry_policy: TransientRetryPolicy,
    stop_token: StopToken,
}

/// Per-call bookkeeping shared by the capture and driving phases
struct Progress {
    state: DriveState,
    polls: u32,
    commands_sent: u32,
    transient_errors: u32,
    retry: RetryWindow,
}

impl Progress {
    fn new(retry: RetryWindow) -> Self {
        Progress {
            state: DriveState::Initializing,
            polls: 0,
            commands_sent: 0,
            transient_errors: 0,
            retry,
        }
    }

    fn enter(&mut self, next: DriveState) {
        debug!(from = ?self.state, to = ?next, "drive state");
        self.state = next;
    }

    // Counters saturate: an unbounded retry policy can fail for as long as
    // the source stays down.
    fn count_poll(&mut self) {
        self.polls = self.polls.saturating_add(1);
    }

    fn count_command(&mut self) {
        self.commands_sent = self.commands_sent.saturating_add(1);
    }

    fn count_transient_error(&mut self) {
        self.transient_errors = self.transient_errors.saturating_add(1);
    }
}

impl<P, S> DistanceDriver<P, S, SystemClock>
where
    P: PoseSource,
    S: CommandSink,
{
    /// Create a new driver on the wall clock
    pub fn new(pose_source: P, command_sink: S, config: &DriverConfig) -> Self {
        Self::with_clock(pose_source, command_sink, SystemClock, config)
    }
}

impl<P, S, C> DistanceDriver<P, S, C>
where
    P: PoseSource,
    S: CommandSink,
    C: Clock,
{
    /// Create a new driver on a custom clock
    pub fn with_clock(pose_source: P, command_sink: S, clock: C, config: &DriverConfig) -> Self {
        DistanceDriver {
            pose_source,
            command_sink,
            clock,
            frames: config.frames(),
            poll_interval: config.poll_interval(),
            readiness_timeout: config.readiness_timeout(),
            retry_policy: config.retry_policy(),
            stop_token: StopToken::new(),
        }
    }

    /// Replace the transient retry policy
    pub fn with_retry_policy(mut self, policy: TransientRetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Handle that cancels sessions started with [`DistanceDriver::drive_forward`]
    pub fn stop_token(&self) -> StopToken {
        self.stop_token.clone()
    }

    pub fn frames(&self) -> &FramePair {
        &self.frames
    }

    /// Drive `distance` meters (negative drives backward) at `speed` m/s and
    /// block until arrival or cancellation through [`DistanceDriver::stop_token`].
    pub fn drive_forward(&mut self, distance: f64, speed: f64) -> Result<DriveReport, DriveError> {
        let request = DriveRequest::new(distance, speed)?;
        let stop = self.stop_token.clone();
        self.drive(&request, &stop)
    }

    /// Run one drive session, checking `stop` once per iteration
    pub fn drive(
        &mut self,
        request: &DriveRequest,
        stop: &StopToken,
    ) -> Result<DriveReport, DriveError> {
        let controller = StraightLineController::new(request.direction(), request.speed());
        let mut progress = Progress::new(self.retry_policy.window());
        info!(
            distance = request.distance(),
            speed = request.speed(),
            frames = %self.frames,
            "starting drive"
        );

        progress.enter(DriveState::WaitingForPose);
        if !self
            .pose_source
            .wait_until_ready(&self.frames, self.readiness_timeout)
        {
            progress.enter(DriveState::Failed);
            warn!(frames = %self.frames, timeout = ?self.readiness_timeout, "pose never became available");
            return Err(DriveError::ReadinessTimeout {
                frames: self.frames.clone(),
                timeout: self.readiness_timeout,
            });
        }

        // Nothing has been commanded yet, so failures here leave the sink untouched.
        let reference = loop {
            if stop.is_cancelled() {
                break None;
            }
            match self.poll_pose(&mut progress) {
                Ok(Some(pose)) => break Some(pose),
                Ok(None) => continue,
                Err(err) => {
                    progress.enter(DriveState::Failed);
                    return Err(err);
                }
            }
        };
        let Some(reference) = reference else {
            return Ok(self.finish(request, &controller, progress, None, DriveOutcome::Cancelled));
        };

        let mut session = DriveSession::new(reference, request);
        let command = controller.drive_command();
        progress.enter(DriveState::Driving);
        debug!(x = reference.x(), y = reference.y(), "captured reference pose");

        let outcome = loop {
            if stop.is_cancelled() {
                break DriveOutcome::Cancelled;
            }
            let pose = match self.poll_pose(&mut progress) {
                Ok(Some(pose)) => pose,
                // Retry at once: no command, no delay
                Ok(None) => continue,
                Err(err) => {
                    progress.enter(DriveState::Failed);
                    self.command_sink.publish(controller.stop_command());
                    progress.enter(DriveState::Stopped);
                    return Err(err);
                }
            };
            progress.count_poll();

            if session.update(pose) {
                break DriveOutcome::Arrived;
            }
            debug!(
                travelled = session.travelled(),
                target = session.target(),
                "not there yet"
            );
            self.command_sink.publish(command);
            progress.count_command();
            self.clock.sleep(self.poll_interval);
        };

        Ok(self.finish(request, &controller, progress, Some(&session), outcome))
    }

    /// Query the latest pose. `Ok(None)` means a transient failure within
    /// the retry bounds.
    fn poll_pose(&self, progress: &mut Progress) -> Result<Option<Pose>, DriveError> {
        match self
            .pose_source
            .relative_pose(&self.frames, PoseTime::Latest)
        {
            Ok(pose) => {
                progress.retry.reset();
                Ok(Some(pose))
            }
            Err(err) => {
                progress.count_transient_error();
                match progress.retry.record_failure(self.clock.now()) {
                    Ok(()) => {
                        debug!(error = %err, attempts = progress.retry.attempts(), "pose lookup failed, retrying");
                        Ok(None)
                    }
                    Err(exhausted) => {
                        warn!(
                            error = %err,
                            attempts = exhausted.attempts,
                            elapsed = ?exhausted.elapsed,
                            "giving up on pose lookups"
                        );
                        Err(DriveError::PoseUnavailable {
                            frames: self.frames.clone(),
                            attempts: exhausted.attempts,
                            elapsed: exhausted.elapsed,
                            last: err,
                        })
                    }
                }
            }
        }
    }

    fn finish(
        &self,
        request: &DriveRequest,
        controller: &StraightLineController,
        mut progress: Progress,
        session: Option<&DriveSession>,
        outcome: DriveOutcome,
    ) -> DriveReport {
        match outcome {
            DriveOutcome::Arrived => progress.enter(DriveState::Arrived),
            DriveOutcome::Cancelled => progress.enter(DriveState::Cancelled),
        }
        self.command_sink.publish(controller.stop_command());
        progress.enter(DriveState::Stopped);

        let travelled = session.map_or(0.0, DriveSession::travelled);
        let target = request.target_distance();
        match outcome {
            DriveOutcome::Arrived => info!(travelled, target, polls = progress.polls, "arrived"),
            DriveOutcome::Cancelled => info!(travelled, target, "drive cancelled"),
        }

        DriveReport {
            outcome,
            direction: request.direction(),
            target,
            travelled,
            polls: progress.polls,
            commands_sent: progress.commands_sent,
            transient_errors: progress.transient_errors,
            final_state: progress.state,
        }
    }
}
