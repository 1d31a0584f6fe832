//! Velocity command sinks

use crate::common::VelocityCommand;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Trait for consumers of velocity commands. Publishing is fire-and-forget:
/// sinks handle (log) their own delivery failures.
pub trait CommandSink: Send + Sync {
    fn publish(&self, command: VelocityCommand);
}

impl<T: CommandSink + ?Sized> CommandSink for Arc<T> {
    fn publish(&self, command: VelocityCommand) {
        (**self).publish(command)
    }
}

impl<T: CommandSink + ?Sized> CommandSink for &T {
    fn publish(&self, command: VelocityCommand) {
        (**self).publish(command)
    }
}

/// Latest-value-wins command slot with a failsafe timeout.
///
/// A command stays in effect until superseded or until `timeout` passes
/// without a new one, after which the slot reads as a full stop.
#[derive(Debug)]
pub struct LatestCommand {
    timeout: Duration,
    slot: Mutex<Option<(VelocityCommand, Instant)>>,
}

impl LatestCommand {
    pub fn new(timeout: Duration) -> Self {
        LatestCommand {
            timeout,
            slot: Mutex::new(None),
        }
    }

    /// The command currently in effect
    pub fn current(&self) -> VelocityCommand {
        self.current_at(Instant::now())
    }

    fn current_at(&self, now: Instant) -> VelocityCommand {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            Some((command, received)) if now.saturating_duration_since(received) <= self.timeout => {
                command
            }
            Some(_) => {
                tracing::trace!("command timed out, holding base still");
                VelocityCommand::zero()
            }
            None => VelocityCommand::zero(),
        }
    }
}

impl CommandSink for LatestCommand {
    fn publish(&self, command: VelocityCommand) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some((command, Instant::now()));
    }
}
