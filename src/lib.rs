//! Odometry-monitored straight-line driving.
//!
//! [`DistanceDriver`] drives a wheeled base a signed distance along its
//! heading: it captures a reference pose from a [`PoseSource`], streams a
//! constant [`VelocityCommand`] to a [`CommandSink`] until the planar
//! displacement reaches the target, then commands a full stop.
pub mod actuation;
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod perception;
pub mod sim;

pub use crate::actuation::CommandSink;
pub use crate::common::{Direction, FramePair, Pose, VelocityCommand};
pub use crate::config::DriveConfig;
pub use crate::control::cancel::StopToken;
pub use crate::control::session::{DriveOutcome, DriveReport, DriveRequest, DriveState};
pub use crate::control::DistanceDriver;
pub use crate::error::{ConfigError, DriveError, PoseError};
pub use crate::perception::{PoseSource, PoseTime};
