//! Bounded retry of transient pose failures

use std::time::{Duration, Instant};

/// Limits on a streak of consecutive failed pose queries. Failed queries
/// are retried immediately; once either limit is exceeded the streak is
/// escalated to a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransientRetryPolicy {
    /// Failures tolerated in one streak; the next one escalates
    pub max_attempts: Option<u32>,
    /// Longest time a streak may last
    pub max_elapsed: Option<Duration>,
}

impl TransientRetryPolicy {
    /// Retry forever
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = Some(elapsed);
        self
    }

    /// Start tracking failure streaks under this policy
    pub fn window(&self) -> RetryWindow {
        RetryWindow {
            policy: *self,
            attempts: 0,
            first_failure: None,
        }
    }
}

/// Streak of failures exceeded the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Running count of consecutive failures
#[derive(Debug, Clone)]
pub struct RetryWindow {
    policy: TransientRetryPolicy,
    attempts: u32,
    first_failure: Option<Instant>,
}

impl RetryWindow {
    /// Record a failure observed at `now`. Returns an error once the streak
    /// exceeds the policy.
    pub fn record_failure(&mut self, now: Instant) -> Result<(), RetryExhausted> {
        self.attempts = self.attempts.saturating_add(1);
        let first = *self.first_failure.get_or_insert(now);
        let elapsed = now.saturating_duration_since(first);

        let too_many = self
            .policy
            .max_attempts
            .is_some_and(|max| self.attempts > max);
        let too_long = self.policy.max_elapsed.is_some_and(|max| elapsed > max);
        if too_many || too_long {
            return Err(RetryExhausted {
                attempts: self.attempts,
                elapsed,
            });
        }
        Ok(())
    }

    /// A query succeeded; the streak is over
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.first_failure = None;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_escalates() {
        let mut window = TransientRetryPolicy::unbounded().window();
        let start = Instant::now();
        for i in 0..10_000 {
            assert!(window
                .record_failure(start + Duration::from_secs(i))
                .is_ok());
        }
    }

    #[test]
    fn attempt_limit_escalates_on_the_next_failure() {
        let mut window = TransientRetryPolicy::default().with_max_attempts(3).window();
        let now = Instant::now();
        assert!(window.record_failure(now).is_ok());
        assert!(window.record_failure(now).is_ok());
        assert!(window.record_failure(now).is_ok());
        let exhausted = window.record_failure(now).unwrap_err();
        assert_eq!(exhausted.attempts, 4);
    }

    #[test]
    fn elapsed_limit_measures_from_first_failure() {
        let mut window = TransientRetryPolicy::default()
            .with_max_elapsed(Duration::from_millis(100))
            .window();
        let start = Instant::now();
        assert!(window.record_failure(start).is_ok());
        assert!(window
            .record_failure(start + Duration::from_millis(100))
            .is_ok());
        let exhausted = window
            .record_failure(start + Duration::from_millis(101))
            .unwrap_err();
        assert_eq!(exhausted.elapsed, Duration::from_millis(101));
        assert_eq!(exhausted.attempts, 3);
    }

    #[test]
    fn success_resets_the_streak() {
        let mut window = TransientRetryPolicy::default().with_max_attempts(1).window();
        let now = Instant::now();
        assert!(window.record_failure(now).is_ok());
        window.reset();
        assert_eq!(window.attempts(), 0);
        assert!(window.record_failure(now).is_ok());
        assert!(window.record_failure(now).is_err());
    }
}
