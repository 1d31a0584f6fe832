//! Drive requests, per-call session state and results

use crate::common::{Direction, Pose};
use crate::error::DriveError;

/// A validated "drive this far at this speed" request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveRequest {
    distance: f64,
    speed: f64,
}

impl DriveRequest {
    /// `distance` in meters is signed (>=0 forward, <0 backward); `speed`
    /// in m/s must be positive.
    pub fn new(distance: f64, speed: f64) -> Result<Self, DriveError> {
        if !distance.is_finite() {
            return Err(DriveError::InvalidDistance(distance));
        }
        if !(speed.is_finite() && speed > 0.0) {
            return Err(DriveError::InvalidSpeed(speed));
        }
        Ok(DriveRequest { distance, speed })
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn direction(&self) -> Direction {
        Direction::from_distance(self.distance)
    }

    /// Unsigned distance to travel
    pub fn target_distance(&self) -> f64 {
        self.distance.abs()
    }
}

/// Where a drive call is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    Initializing,
    WaitingForPose,
    Driving,
    Arrived,
    Cancelled,
    Failed,
    Stopped,
}

/// Working state of one drive call.
///
/// The reference pose is fixed at creation; every update measures from it.
#[derive(Debug, Clone)]
pub struct DriveSession {
    reference: Pose,
    travelled: f64,
    target: f64,
    arrived: bool,
}

impl DriveSession {
    pub fn new(reference: Pose, request: &DriveRequest) -> Self {
        DriveSession {
            reference,
            travelled: 0.0,
            target: request.target_distance(),
            arrived: false,
        }
    }

    /// Record a new pose sample. Returns whether the target has been reached;
    /// once reached it stays reached.
    pub fn update(&mut self, pose: Pose) -> bool {
        self.travelled = self.reference.planar_distance_to(&pose);
        if self.travelled >= self.target {
            self.arrived = true;
        }
        self.arrived
    }

    pub fn reference(&self) -> &Pose {
        &self.reference
    }

    pub fn travelled(&self) -> f64 {
        self.travelled
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn arrived(&self) -> bool {
        self.arrived
    }
}

/// How a completed drive ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    Arrived,
    Cancelled,
}

/// Summary of a completed drive call
#[derive(Debug, Clone, PartialEq)]
pub struct DriveReport {
    pub outcome: DriveOutcome,
    pub direction: Direction,
    /// Unsigned target distance in meters
    pub target: f64,
    /// Planar distance from the reference pose at the last successful poll
    pub travelled: f64,
    /// Successful pose polls after the reference pose was captured
    pub polls: u32,
    /// Non-zero velocity commands sent
    pub commands_sent: u32,
    /// Pose queries that failed and were retried
    pub transient_errors: u32,
    pub final_state: DriveState,
}
