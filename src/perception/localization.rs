//! Dead-reckoning pose integration

use crate::common::{Pose, VelocityCommand};
use std::f64::consts::PI;
use std::time::Duration;

/// Integrates body-frame velocities into a planar pose
#[derive(Debug, Clone)]
pub struct OdometryIntegrator {
    x: f64,
    y: f64,
    theta: f64,
}

impl OdometryIntegrator {
    /// Create an integrator at the origin
    pub fn new() -> Self {
        Self::from_pose(0.0, 0.0, 0.0)
    }

    /// Create an integrator starting at `(x, y, theta)`
    pub fn from_pose(x: f64, y: f64, theta: f64) -> Self {
        OdometryIntegrator {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Advance the estimate by applying `velocity` for `dt`
    pub fn integrate(&mut self, velocity: VelocityCommand, dt: Duration) -> Pose {
        let dt = dt.as_secs_f64();
        let distance = velocity.linear * dt;
        let dtheta = velocity.angular * dt;

        // Mid-point heading for the translation step
        let mid_theta = self.theta + dtheta / 2.0;
        self.x += distance * mid_theta.cos();
        self.y += distance * mid_theta.sin();
        self.theta = normalize_angle(self.theta + dtheta);

        self.pose()
    }

    /// Get the current pose estimate
    pub fn pose(&self) -> Pose {
        Pose::from_xy_yaw(self.x, self.y, self.theta)
    }
}

impl Default for OdometryIntegrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap an angle to [-pi, pi]
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}
