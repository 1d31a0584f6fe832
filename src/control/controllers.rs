//! Controllers for the robot

use crate::common::{Direction, VelocityCommand};

/// Open-loop straight-line controller: constant speed along the heading,
/// no steering correction.
#[derive(Debug, Clone, Copy)]
pub struct StraightLineController {
    command: VelocityCommand,
}

impl StraightLineController {
    /// Create a controller driving at `speed` (magnitude) in `direction`
    pub fn new(direction: Direction, speed: f64) -> Self {
        StraightLineController {
            command: VelocityCommand::new(direction.signum() * speed.abs(), 0.0),
        }
    }

    /// Command to send while the target is not reached
    pub fn drive_command(&self) -> VelocityCommand {
        self.command
    }

    /// Command to send on arrival or abort
    pub fn stop_command(&self) -> VelocityCommand {
        VelocityCommand::zero()
    }
}
