//! Test doubles for driving `DistanceDriver` deterministically.
//!
//! Source, sink and clock append to one shared event log so tests can
//! assert on the exact interleaving of lookups, commands and delays.
#![allow(dead_code)]

use dead_reckoning::config::DriverConfig;
use dead_reckoning::control::clock::Clock;
use dead_reckoning::{CommandSink, FramePair, Pose, PoseError, PoseSource, PoseTime, StopToken, VelocityCommand};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Lookup(Result<(f64, f64), PoseError>),
    Publish(VelocityCommand),
    Sleep(Duration),
}

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<VelocityCommand> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Publish(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn lookups(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Lookup(_)))
            .count()
    }

    pub fn sleeps(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Sleep(_)))
            .count()
    }
}

/// Replays a fixed list of lookup results, then repeats the last pose.
pub struct ScriptedPoseSource {
    ready: bool,
    script: Mutex<VecDeque<Result<Pose, PoseError>>>,
    last: Mutex<Pose>,
    log: EventLog,
}

impl ScriptedPoseSource {
    pub fn new(log: &EventLog, script: Vec<Result<Pose, PoseError>>) -> Self {
        ScriptedPoseSource {
            ready: true,
            script: Mutex::new(script.into()),
            last: Mutex::new(Pose::identity()),
            log: log.clone(),
        }
    }

    /// Poses along x, starting with the reference pose at the origin
    pub fn along_x(log: &EventLog, xs: &[f64]) -> Self {
        let mut script = vec![Ok(Pose::identity())];
        script.extend(xs.iter().map(|&x| Ok(Pose::from_xy_yaw(x, 0.0, 0.0))));
        Self::new(log, script)
    }

    pub fn never_ready(log: &EventLog) -> Self {
        ScriptedPoseSource {
            ready: false,
            ..Self::new(log, Vec::new())
        }
    }
}

impl PoseSource for ScriptedPoseSource {
    fn wait_until_ready(&self, _frames: &FramePair, _timeout: Duration) -> bool {
        self.ready
    }

    fn relative_pose(&self, _frames: &FramePair, _at: PoseTime) -> Result<Pose, PoseError> {
        let next = self.script.lock().unwrap().pop_front();
        let result = match next {
            Some(Ok(pose)) => {
                *self.last.lock().unwrap() = pose;
                Ok(pose)
            }
            Some(Err(err)) => Err(err),
            None => Ok(*self.last.lock().unwrap()),
        };
        self.log
            .push(Event::Lookup(result.clone().map(|pose| (pose.x(), pose.y()))));
        result
    }
}

pub struct RecordingSink {
    log: EventLog,
}

impl RecordingSink {
    pub fn new(log: &EventLog) -> Self {
        RecordingSink { log: log.clone() }
    }
}

impl CommandSink for RecordingSink {
    fn publish(&self, command: VelocityCommand) {
        self.log.push(Event::Publish(command));
    }
}

/// Clock that never blocks. Sleeping advances it by the requested amount,
/// every `now()` call advances it by `tick`.
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
    tick: Duration,
    cancel_after_sleeps: Option<(usize, StopToken)>,
    sleeps: Mutex<usize>,
    log: EventLog,
}

impl ManualClock {
    pub fn new(log: &EventLog) -> Self {
        ManualClock {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            tick: Duration::ZERO,
            cancel_after_sleeps: None,
            sleeps: Mutex::new(0),
            log: log.clone(),
        }
    }

    pub fn ticking(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn cancel_after(mut self, sleeps: usize, token: StopToken) -> Self {
        self.cancel_after_sleeps = Some((sleeps, token));
        self
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut offset = self.offset.lock().unwrap();
        *offset += self.tick;
        self.start + *offset
    }

    fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
        self.log.push(Event::Sleep(duration));
        let mut sleeps = self.sleeps.lock().unwrap();
        *sleeps += 1;
        if let Some((limit, token)) = &self.cancel_after_sleeps {
            if *sleeps >= *limit {
                token.cancel();
            }
        }
    }
}

pub fn driver_config() -> DriverConfig {
    DriverConfig::default()
}

pub fn connectivity() -> PoseError {
    PoseError::Connectivity("transform dropped".into())
}
