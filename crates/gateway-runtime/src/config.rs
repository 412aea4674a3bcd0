//! Runtime configuration.
//!
//! Compile-time defaults with environment variable overrides, the same
//! priority order the scheduler this runtime was adapted from uses:
//! environment first, library defaults otherwise. Protocol-specific timer
//! values (T200, T301, the NFAS heartbeat interval, ...) live on each
//! domain crate's own `*Config` type; this is only the runtime-level
//! knobs: task queue sizing and the timer thread's poll cadence.

use gateway_core::env::env_get;
use std::time::Duration;

mod defaults {
    pub const CHANNEL_CAPACITY: usize = 256;
    pub const TIMER_MAX_POLL_INTERVAL_MS: u64 = 5;
    pub const TIMER_MIN_SLEEP_US: u64 = 100;
    pub const TASK_STACK_SIZE: usize = 2 * 1024 * 1024;
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Default bounded capacity for a task's command/event queue.
    pub channel_capacity: usize,
    /// Upper bound on how long the timer thread sleeps between polls when
    /// no timer is due sooner.
    pub timer_max_poll_interval: Duration,
    /// Lower bound on the timer thread's sleep, to avoid busy-spinning
    /// when a timer is due imminently.
    pub timer_min_sleep: Duration,
    /// Stack size for each spawned task thread.
    pub task_stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Build from compile-time defaults with environment overrides.
    ///
    /// - `GW_CHANNEL_CAPACITY`
    /// - `GW_TIMER_MAX_POLL_INTERVAL_MS`
    /// - `GW_TIMER_MIN_SLEEP_US`
    /// - `GW_TASK_STACK_SIZE`
    pub fn from_env() -> Self {
        Self {
            channel_capacity: env_get("GW_CHANNEL_CAPACITY", defaults::CHANNEL_CAPACITY),
            timer_max_poll_interval: Duration::from_millis(env_get(
                "GW_TIMER_MAX_POLL_INTERVAL_MS",
                defaults::TIMER_MAX_POLL_INTERVAL_MS,
            )),
            timer_min_sleep: Duration::from_micros(env_get(
                "GW_TIMER_MIN_SLEEP_US",
                defaults::TIMER_MIN_SLEEP_US,
            )),
            task_stack_size: env_get("GW_TASK_STACK_SIZE", defaults::TASK_STACK_SIZE),
        }
    }

    /// Explicit defaults, ignoring the environment. Used by tests that need
    /// deterministic configuration regardless of the process environment.
    pub fn new() -> Self {
        Self {
            channel_capacity: defaults::CHANNEL_CAPACITY,
            timer_max_poll_interval: Duration::from_millis(defaults::TIMER_MAX_POLL_INTERVAL_MS),
            timer_min_sleep: Duration::from_micros(defaults::TIMER_MIN_SLEEP_US),
            task_stack_size: defaults::TASK_STACK_SIZE,
        }
    }

    pub fn channel_capacity(mut self, cap: usize) -> Self {
        self.channel_capacity = cap;
        self
    }

    pub fn timer_max_poll_interval(mut self, d: Duration) -> Self {
        self.timer_max_poll_interval = d;
        self
    }

    pub fn timer_min_sleep(mut self, d: Duration) -> Self {
        self.timer_min_sleep = d;
        self
    }

    pub fn task_stack_size(mut self, size: usize) -> Self {
        self.task_stack_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue("channel_capacity must be > 0"));
        }
        if self.task_stack_size < 64 * 1024 {
            return Err(ConfigError::InvalidValue("task_stack_size must be >= 64KB"));
        }
        if self.timer_min_sleep > self.timer_max_poll_interval {
            return Err(ConfigError::InvalidValue(
                "timer_min_sleep must be <= timer_max_poll_interval",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid runtime config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RuntimeConfig::new().validate().is_ok());
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = RuntimeConfig::new()
            .channel_capacity(16)
            .task_stack_size(4 * 1024 * 1024);
        assert_eq!(cfg.channel_capacity, 16);
        assert_eq!(cfg.task_stack_size, 4 * 1024 * 1024);
    }

    #[test]
    fn zero_channel_capacity_rejected() {
        let cfg = RuntimeConfig::new().channel_capacity(0);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn inverted_timer_bounds_rejected() {
        let cfg = RuntimeConfig::new()
            .timer_min_sleep(Duration::from_millis(100))
            .timer_max_poll_interval(Duration::from_millis(1));
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue(_))));
    }
}
