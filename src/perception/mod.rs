//! Pose sources for the drive stack
pub mod buffer;
pub mod localization;

use crate::common::{FramePair, Pose};
use crate::error::PoseError;
use std::sync::Arc;
use std::time::Duration;

/// Which pose to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseTime {
    /// The newest available estimate
    Latest,
    /// The estimate at a stamp on the source's clock
    At(Duration),
}

/// Trait for anything that can report the relative pose between two frames
pub trait PoseSource: Send + Sync {
    /// Block until a pose for `frames` is available or `timeout` elapses.
    /// Returns whether a pose became available.
    fn wait_until_ready(&self, frames: &FramePair, timeout: Duration) -> bool;

    /// Resolve the pose of `frames.target` in `frames.reference`
    fn relative_pose(&self, frames: &FramePair, at: PoseTime) -> Result<Pose, PoseError>;
}

impl<T: PoseSource + ?Sized> PoseSource for Arc<T> {
    fn wait_until_ready(&self, frames: &FramePair, timeout: Duration) -> bool {
        (**self).wait_until_ready(frames, timeout)
    }

    fn relative_pose(&self, frames: &FramePair, at: PoseTime) -> Result<Pose, PoseError> {
        (**self).relative_pose(frames, at)
    }
}

impl<T: PoseSource + ?Sized> PoseSource for &T {
    fn wait_until_ready(&self, frames: &FramePair, timeout: Duration) -> bool {
        (**self).wait_until_ready(frames, timeout)
    }

    fn relative_pose(&self, frames: &FramePair, at: PoseTime) -> Result<Pose, PoseError> {
        (**self).relative_pose(frames, at)
    }
}
