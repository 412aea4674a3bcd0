//! Per-call-control-instance timer configuration.

use gateway_core::env::env_get;
use std::time::Duration;

mod defaults {
    pub const T301_MS: u64 = 180_000;
    pub const T303_MS: u64 = 4_000;
    pub const T305_MS: u64 = 30_000;
    pub const T308_MS: u64 = 4_000;
    pub const T310_MS: u64 = 10_000;
    pub const T302_MS: u64 = 10_000;
}

#[derive(Debug, Clone)]
pub struct CallControlConfig {
    /// Alerting timer: no answer within this window clears the call.
    pub t301: Duration,
    /// SETUP acknowledgement timer.
    pub t303: Duration,
    /// DISCONNECT acknowledgement timer.
    pub t305: Duration,
    /// RELEASE acknowledgement timer; one retry on expiry.
    pub t308: Duration,
    /// CALL PROCEEDING -> next-state timer.
    pub t310: Duration,
    /// Overlap-receiving accumulation timer.
    pub t302: Duration,
}

impl Default for CallControlConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CallControlConfig {
    /// `Q931_T301_MS`, `Q931_T303_MS`, `Q931_T305_MS`, `Q931_T308_MS`,
    /// `Q931_T310_MS`, `Q931_T302_MS`.
    pub fn from_env() -> Self {
        Self {
            t301: Duration::from_millis(env_get("Q931_T301_MS", defaults::T301_MS)),
            t303: Duration::from_millis(env_get("Q931_T303_MS", defaults::T303_MS)),
            t305: Duration::from_millis(env_get("Q931_T305_MS", defaults::T305_MS)),
            t308: Duration::from_millis(env_get("Q931_T308_MS", defaults::T308_MS)),
            t310: Duration::from_millis(env_get("Q931_T310_MS", defaults::T310_MS)),
            t302: Duration::from_millis(env_get("Q931_T302_MS", defaults::T302_MS)),
        }
    }

    pub fn new() -> Self {
        Self {
            t301: Duration::from_millis(defaults::T301_MS),
            t303: Duration::from_millis(defaults::T303_MS),
            t305: Duration::from_millis(defaults::T305_MS),
            t308: Duration::from_millis(defaults::T308_MS),
            t310: Duration::from_millis(defaults::T310_MS),
            t302: Duration::from_millis(defaults::T302_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = CallControlConfig::new();
        assert_eq!(cfg.t301, Duration::from_secs(180));
        assert_eq!(cfg.t303, Duration::from_secs(4));
        assert_eq!(cfg.t305, Duration::from_secs(30));
        assert_eq!(cfg.t308, Duration::from_secs(4));
        assert_eq!(cfg.t310, Duration::from_secs(10));
    }
}
