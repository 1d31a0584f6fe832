//! Configuration loading for the drive stack

use crate::common::FramePair;
use crate::control::retry::TransientRetryPolicy;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration. Every section is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub drive: DriveParams,
    pub driver: DriverConfig,
    pub pose_buffer: PoseBufferConfig,
    pub sim: SimConfig,
}

/// The drive to execute
#[derive(Clone, Debug, Deserialize)]
pub struct DriveParams {
    /// Signed distance in meters (>0 forward, <0 backward)
    #[serde(default = "default_distance")]
    pub distance_meters: f64,

    /// Speed magnitude in m/s
    #[serde(default = "default_speed")]
    pub speed_meters_per_second: f64,
}

/// Control loop settings
#[derive(Clone, Debug, Deserialize)]
pub struct DriverConfig {
    /// Delay between successful pose polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long to wait for the first pose before giving up
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,

    /// Fixed frame the robot moves in
    #[serde(default = "default_reference_frame")]
    pub reference_frame: String,

    /// Robot body frame
    #[serde(default = "default_target_frame")]
    pub target_frame: String,

    #[serde(default)]
    pub transient_retry: RetryConfig,
}

/// Bounds on consecutive failed pose queries
#[derive(Clone, Debug, Deserialize)]
pub struct RetryConfig {
    /// Maximum consecutive failures tolerated (unbounded when absent)
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Maximum time spent in one failure streak (0 disables the bound)
    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: Option<u64>,
}

/// Pose history kept by concrete pose sources
#[derive(Clone, Debug, Deserialize)]
pub struct PoseBufferConfig {
    /// Number of stamped poses retained
    #[serde(default = "default_history")]
    pub history: usize,

    /// Age after which the newest pose is treated as missing (0 disables
    /// the check)
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: Option<u64>,
}

/// Simulated base settings
#[derive(Clone, Debug, Deserialize)]
pub struct SimConfig {
    /// Odometry publish rate
    #[serde(default = "default_odom_rate_hz")]
    pub odom_rate_hz: f64,

    /// Delay before the first odometry sample
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// The base stops when no command arrives for this long
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Fraction of pose lookups that fail with a connectivity error
    #[serde(default)]
    pub dropout_probability: f64,

    /// Seed for the dropout generator
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for DriveParams {
    fn default() -> Self {
        Self {
            distance_meters: default_distance(),
            speed_meters_per_second: default_speed(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            reference_frame: default_reference_frame(),
            target_frame: default_target_frame(),
            transient_retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            max_elapsed_ms: default_max_elapsed_ms(),
        }
    }
}

impl Default for PoseBufferConfig {
    fn default() -> Self {
        Self {
            history: default_history(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            odom_rate_hz: default_odom_rate_hz(),
            startup_delay_ms: default_startup_delay_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            dropout_probability: 0.0,
            seed: None,
        }
    }
}

// Default value functions
fn default_distance() -> f64 {
    -0.5
}
fn default_speed() -> f64 {
    0.1
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_readiness_timeout_ms() -> u64 {
    1000
}
fn default_reference_frame() -> String {
    "odom".to_string()
}
fn default_target_frame() -> String {
    "base_link".to_string()
}
fn default_max_elapsed_ms() -> Option<u64> {
    Some(2000)
}
fn default_history() -> usize {
    64
}
fn default_stale_after_ms() -> Option<u64> {
    Some(500)
}
fn default_odom_rate_hz() -> f64 {
    50.0
}
fn default_startup_delay_ms() -> u64 {
    200
}
fn default_command_timeout_ms() -> u64 {
    500
}

impl DriverConfig {
    pub fn frames(&self) -> FramePair {
        FramePair::new(&self.reference_frame, &self.target_frame)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn retry_policy(&self) -> TransientRetryPolicy {
        TransientRetryPolicy {
            max_attempts: self.transient_retry.max_attempts,
            max_elapsed: self
                .transient_retry
                .max_elapsed_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
        }
    }
}

impl PoseBufferConfig {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }
}

impl SimConfig {
    /// Odometry period. Rates that give no usable period fall back to the
    /// default rate.
    pub fn tick_period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.odom_rate_hz)
            .ok()
            .filter(|period| !period.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(1.0 / default_odom_rate_hz()))
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl DriveConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DriveConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the drive stack cannot run with. Drive distance and
    /// speed are checked by the driver itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "driver.poll_interval_ms must be positive".into(),
            ));
        }
        if self.driver.reference_frame.is_empty() || self.driver.target_frame.is_empty() {
            return Err(ConfigError::Invalid("frame names must not be empty".into()));
        }
        if self.driver.reference_frame == self.driver.target_frame {
            return Err(ConfigError::Invalid(format!(
                "reference and target frame are both '{}'",
                self.driver.reference_frame
            )));
        }
        if self.pose_buffer.history == 0 {
            return Err(ConfigError::Invalid(
                "pose_buffer.history must be positive".into(),
            ));
        }
        if !(self.sim.odom_rate_hz.is_finite() && self.sim.odom_rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sim.odom_rate_hz must be positive (got {})",
                self.sim.odom_rate_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.sim.dropout_probability) {
            return Err(ConfigError::Invalid(format!(
                "sim.dropout_probability must be within [0, 1] (got {})",
                self.sim.dropout_probability
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = DriveConfig::from_toml_str("").unwrap();
        assert_eq!(config.drive.distance_meters, -0.5);
        assert_eq!(config.drive.speed_meters_per_second, 0.1);
        assert_eq!(config.driver.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.driver.readiness_timeout(), Duration::from_secs(1));
        assert_eq!(config.driver.frames(), FramePair::new("odom", "base_link"));
        assert_eq!(
            config.driver.retry_policy().max_elapsed,
            Some(Duration::from_secs(2))
        );
        assert_eq!(config.driver.retry_policy().max_attempts, None);
    }

    #[test]
    fn sections_override_defaults() {
        let config = DriveConfig::from_toml_str(
            r#"
            [drive]
            distance_meters = 1.25
            speed_meters_per_second = 0.3

            [driver]
            poll_interval_ms = 50
            target_frame = "base_footprint"

            [driver.transient_retry]
            max_attempts = 20

            [sim]
            odom_rate_hz = 100.0
            dropout_probability = 0.1
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.drive.distance_meters, 1.25);
        assert_eq!(config.driver.poll_interval_ms, 50);
        assert_eq!(config.driver.frames().target, "base_footprint");
        assert_eq!(config.driver.retry_policy().max_attempts, Some(20));
        assert!((config.sim.tick_period().as_secs_f64() - 0.01).abs() < 1e-9);
        assert_eq!(config.sim.seed, Some(7));
        // untouched fields keep their defaults
        assert_eq!(config.driver.readiness_timeout_ms, 1000);
        assert_eq!(config.pose_buffer.history, 64);
    }

    #[test]
    fn zero_disables_elapsed_bound_and_staleness() {
        let config = DriveConfig::from_toml_str(
            "[driver.transient_retry]\nmax_elapsed_ms = 0\n\n[pose_buffer]\nstale_after_ms = 0\n",
        )
        .unwrap();
        let policy = config.driver.retry_policy();
        assert_eq!(policy.max_elapsed, None);
        assert_eq!(policy.max_attempts, None);
        assert_eq!(config.pose_buffer.stale_after(), None);
    }

    #[test]
    fn unusable_rate_falls_back_to_default_period() {
        for rate in [0.0, -10.0, f64::NAN, 1e-300] {
            let sim = SimConfig {
                odom_rate_hz: rate,
                ..SimConfig::default()
            };
            assert_eq!(sim.tick_period(), Duration::from_millis(20), "rate {rate}");
        }
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = DriveConfig::from_toml_str("[driver]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn identical_frames_are_rejected() {
        let err = DriveConfig::from_toml_str(
            "[driver]\nreference_frame = \"odom\"\ntarget_frame = \"odom\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn dropout_probability_must_be_a_probability() {
        let err = DriveConfig::from_toml_str("[sim]\ndropout_probability = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = DriveConfig::from_toml_str("[drive\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = DriveConfig::load(Path::new("/nonexistent/dead_reckoning.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
