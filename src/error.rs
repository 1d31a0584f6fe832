//! Error types for the drive stack

use crate::common::FramePair;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to resolve a pose. Every variant is temporary from the driver's
/// point of view and is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("no pose available for {reference} -> {target}")]
    Lookup { reference: String, target: String },

    #[error("requested stamp {requested:?} is outside the buffered range [{oldest:?}, {newest:?}]")]
    Extrapolation {
        requested: Duration,
        oldest: Duration,
        newest: Duration,
    },

    #[error("newest pose is {age:?} old")]
    Stale { age: Duration },

    #[error("pose source disconnected: {0}")]
    Connectivity(String),
}

impl PoseError {
    pub(crate) fn lookup(frames: &FramePair) -> Self {
        PoseError::Lookup {
            reference: frames.reference.clone(),
            target: frames.target.clone(),
        }
    }
}

/// Failure of a drive call
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("speed must be a positive, finite number of m/s (got {0})")]
    InvalidSpeed(f64),

    #[error("distance must be finite (got {0})")]
    InvalidDistance(f64),

    #[error("pose {frames} did not become available within {timeout:?}")]
    ReadinessTimeout { frames: FramePair, timeout: Duration },

    #[error("pose {frames} unavailable after {attempts} consecutive failures over {elapsed:?}")]
    PoseUnavailable {
        frames: FramePair,
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: PoseError,
    },
}

/// Failure to load or validate configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
