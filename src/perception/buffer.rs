//! Stamped pose history for a single frame pair
//!
//! Producers (odometry integrators, middleware callbacks) insert stamped
//! poses; consumers resolve the newest pose or interpolate at a stamp.
//! Handles are cheap to clone and share one history.

use super::{PoseSource, PoseTime};
use crate::common::{FramePair, Pose};
use crate::error::PoseError;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A pose with the source-clock stamp it was measured at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedPose {
    pub stamp: Duration,
    pub pose: Pose,
}

/// Bounded, thread-safe pose history
#[derive(Clone)]
pub struct PoseBuffer {
    shared: Arc<Shared>,
}

struct Shared {
    frames: FramePair,
    capacity: usize,
    stale_after: Option<Duration>,
    state: Mutex<BufferState>,
    ready: Condvar,
}

#[derive(Default)]
struct BufferState {
    samples: VecDeque<StampedPose>,
    last_received: Option<Instant>,
    closed: bool,
}

impl PoseBuffer {
    /// Create an empty buffer holding at most `capacity` samples
    pub fn new(frames: FramePair, capacity: usize, stale_after: Option<Duration>) -> Self {
        PoseBuffer {
            shared: Arc::new(Shared {
                frames,
                capacity: capacity.max(1),
                stale_after,
                state: Mutex::new(BufferState::default()),
                ready: Condvar::new(),
            }),
        }
    }

    pub fn frames(&self) -> &FramePair {
        &self.shared.frames
    }

    /// Append a sample. Samples stamped at or before the newest one are
    /// dropped; returns whether the sample was stored.
    pub fn insert(&self, stamp: Duration, pose: Pose) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        if let Some(newest) = state.samples.back() {
            if stamp <= newest.stamp {
                tracing::trace!(?stamp, newest = ?newest.stamp, "dropping out-of-order pose");
                return false;
            }
        }
        state.samples.push_back(StampedPose { stamp, pose });
        while state.samples.len() > self.shared.capacity {
            state.samples.pop_front();
        }
        state.last_received = Some(Instant::now());
        drop(state);
        self.shared.ready.notify_all();
        true
    }

    /// Mark the producer as gone. Pending and future lookups fail with a
    /// connectivity error.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    /// The newest stored sample, ignoring staleness
    pub fn newest(&self) -> Option<StampedPose> {
        self.lock().samples.back().copied()
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, at: PoseTime) -> Result<Pose, PoseError> {
        let state = self.lock();
        if state.closed {
            return Err(PoseError::Connectivity(format!(
                "pose buffer for {} is closed",
                self.shared.frames
            )));
        }
        let (Some(oldest), Some(newest)) = (state.samples.front(), state.samples.back()) else {
            return Err(PoseError::lookup(&self.shared.frames));
        };

        match at {
            PoseTime::Latest => {
                if let (Some(limit), Some(received)) = (self.shared.stale_after, state.last_received)
                {
                    let age = received.elapsed();
                    if age > limit {
                        return Err(PoseError::Stale { age });
                    }
                }
                Ok(newest.pose)
            }
            PoseTime::At(stamp) => {
                if stamp < oldest.stamp || stamp > newest.stamp {
                    return Err(PoseError::Extrapolation {
                        requested: stamp,
                        oldest: oldest.stamp,
                        newest: newest.stamp,
                    });
                }
                // First sample at or after the stamp; one exists because stamp <= newest.
                let after = state
                    .samples
                    .iter()
                    .position(|sample| sample.stamp >= stamp)
                    .unwrap_or(state.samples.len() - 1);
                let next = state.samples[after];
                if next.stamp == stamp || after == 0 {
                    return Ok(next.pose);
                }
                let prev = state.samples[after - 1];
                let span = (next.stamp - prev.stamp).as_secs_f64();
                let ratio = (stamp - prev.stamp).as_secs_f64() / span;
                Ok(prev.pose.interpolate(&next.pose, ratio))
            }
        }
    }
}

impl PoseSource for PoseBuffer {
    fn wait_until_ready(&self, frames: &FramePair, timeout: Duration) -> bool {
        if *frames != self.shared.frames {
            tracing::warn!(requested = %frames, buffered = %self.shared.frames, "no pose source for frame pair");
            return false;
        }
        let state = self.lock();
        let (state, _) = self
            .shared
            .ready
            .wait_timeout_while(state, timeout, |state| {
                state.samples.is_empty() && !state.closed
            })
            .unwrap_or_else(PoisonError::into_inner);
        !state.samples.is_empty() && !state.closed
    }

    fn relative_pose(&self, frames: &FramePair, at: PoseTime) -> Result<Pose, PoseError> {
        if *frames != self.shared.frames {
            return Err(PoseError::lookup(frames));
        }
        self.lookup(at)
    }
}
