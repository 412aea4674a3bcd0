//! NFAS group configuration.

use gateway_core::env::env_get;
use std::time::Duration;

mod defaults {
    pub const HEARTBEAT_MS: u64 = 5_000;
    pub const SWITCHOVER_TIMEOUT_MS: u64 = 5_000;
    pub const MAX_SWITCHOVER_ATTEMPTS: u32 = 3;
    pub const QUEUE_DEPTH: usize = 64;
    pub const HEARTBEAT_LOSS_THRESHOLD: u32 = 3;
}

/// Q.921 `RR(P=1)` polls are the default link heartbeat; `StatusEnquiry`
/// (Q.931, SAPI 0) is kept for interop with peers that expect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatMode {
    LapdPoll,
    StatusEnquiry,
}

#[derive(Debug, Clone)]
pub struct NfasConfig {
    pub heartbeat_interval: Duration,
    pub switchover_timeout: Duration,
    pub max_switchover_attempts: u32,
    /// Bounded upstream queue depth during `Switching`.
    pub queue_depth: usize,
    pub heartbeat_mode: HeartbeatMode,
    /// Consecutive heartbeat dispatch failures before a switchover triggers.
    pub heartbeat_loss_threshold: u32,
}

impl Default for NfasConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NfasConfig {
    /// `NFAS_HEARTBEAT_MS`, `NFAS_SWITCHOVER_TIMEOUT_MS`,
    /// `NFAS_MAX_SWITCHOVER_ATTEMPTS`, `NFAS_QUEUE_DEPTH`,
    /// `NFAS_HEARTBEAT_LOSS_THRESHOLD`.
    pub fn from_env() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(env_get("NFAS_HEARTBEAT_MS", defaults::HEARTBEAT_MS)),
            switchover_timeout: Duration::from_millis(env_get("NFAS_SWITCHOVER_TIMEOUT_MS", defaults::SWITCHOVER_TIMEOUT_MS)),
            max_switchover_attempts: env_get("NFAS_MAX_SWITCHOVER_ATTEMPTS", defaults::MAX_SWITCHOVER_ATTEMPTS),
            queue_depth: env_get("NFAS_QUEUE_DEPTH", defaults::QUEUE_DEPTH),
            heartbeat_mode: HeartbeatMode::LapdPoll,
            heartbeat_loss_threshold: env_get("NFAS_HEARTBEAT_LOSS_THRESHOLD", defaults::HEARTBEAT_LOSS_THRESHOLD),
        }
    }

    pub fn new() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(defaults::HEARTBEAT_MS),
            switchover_timeout: Duration::from_millis(defaults::SWITCHOVER_TIMEOUT_MS),
            max_switchover_attempts: defaults::MAX_SWITCHOVER_ATTEMPTS,
            queue_depth: defaults::QUEUE_DEPTH,
            heartbeat_mode: HeartbeatMode::LapdPoll,
            heartbeat_loss_threshold: defaults::HEARTBEAT_LOSS_THRESHOLD,
        }
    }
}
