//! Common types shared by the drive stack

use nalgebra::{UnitQuaternion, Vector3};
use std::fmt;

/// Snapshot of a frame's position and orientation relative to another frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Pose {
    /// Create a pose from a translation and a rotation
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Pose {
            translation,
            rotation,
        }
    }

    /// The pose of a frame coincident with its reference frame
    pub fn identity() -> Self {
        Pose::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// Planar pose with heading `yaw` (radians) about the vertical axis
    pub fn from_xy_yaw(x: f64, y: f64, yaw: f64) -> Self {
        Pose::new(
            Vector3::new(x, y, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
        )
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    /// Heading about the vertical axis
    pub fn yaw(&self) -> f64 {
        self.rotation.euler_angles().2
    }

    /// Euclidean distance to `other` in the horizontal plane. The vertical
    /// component of the translation does not contribute.
    pub fn planar_distance_to(&self, other: &Pose) -> f64 {
        let delta = other.translation - self.translation;
        (delta.x * delta.x + delta.y * delta.y).sqrt()
    }

    /// Blend between `self` (ratio 0) and `other` (ratio 1): linear in
    /// translation, spherical in rotation.
    pub fn interpolate(&self, other: &Pose, ratio: f64) -> Pose {
        let translation = self.translation.lerp(&other.translation, ratio);
        // Opposite orientations have no unique slerp path; snap to the nearer end.
        let rotation = self
            .rotation
            .try_slerp(&other.rotation, ratio, 1.0e-9)
            .unwrap_or(if ratio < 0.5 {
                self.rotation
            } else {
                other.rotation
            });
        Pose::new(translation, rotation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::identity()
    }
}

/// A pair of named coordinate frames: the pose of `target` expressed in `reference`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramePair {
    pub reference: String,
    pub target: String,
}

impl FramePair {
    pub fn new(reference: impl Into<String>, target: impl Into<String>) -> Self {
        FramePair {
            reference: reference.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for FramePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.reference, self.target)
    }
}

/// Direction of travel along the current heading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Zero and positive distances drive forward, negative distances backward.
    pub fn from_distance(distance: f64) -> Self {
        if distance >= 0.0 {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }

    pub fn signum(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}

/// Linear/angular velocity pair sent to the base
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityCommand {
    /// m/s along the robot's heading
    pub linear: f64,
    /// rad/s about the vertical axis
    pub angular: f64,
}

impl VelocityCommand {
    pub fn new(linear: f64, angular: f64) -> Self {
        VelocityCommand { linear, angular }
    }

    /// Full stop
    pub fn zero() -> Self {
        VelocityCommand::new(0.0, 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.linear == 0.0 && self.angular == 0.0
    }
}
