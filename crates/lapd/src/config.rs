//! Per-engine configuration, following the gateway's compile-time-default
//! plus environment-override convention.

use gateway_core::env::env_get;
use std::time::Duration;

mod defaults {
    pub const T200_MS: u64 = 1000;
    pub const T203_MS: u64 = 10_000;
    pub const N200: u32 = 3;
    pub const WINDOW_K: u8 = 7;
    pub const N201: usize = 260;
}

#[derive(Debug, Clone)]
pub struct LapdConfig {
    /// Retransmission timer.
    pub t200: Duration,
    /// Idle-link probe timer.
    pub t203: Duration,
    /// Retransmission retry limit before declaring the link lost.
    pub n200: u32,
    /// Maximum unacknowledged I-frames in flight, `V(S) - V(A) (mod 128)`.
    pub window_k: u8,
    /// Maximum information field length in octets.
    pub n201: usize,
}

impl Default for LapdConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LapdConfig {
    /// `LAPD_T200_MS`, `LAPD_T203_MS`, `LAPD_N200`, `LAPD_WINDOW_K`, `LAPD_N201`.
    pub fn from_env() -> Self {
        Self {
            t200: Duration::from_millis(env_get("LAPD_T200_MS", defaults::T200_MS)),
            t203: Duration::from_millis(env_get("LAPD_T203_MS", defaults::T203_MS)),
            n200: env_get("LAPD_N200", defaults::N200),
            window_k: env_get("LAPD_WINDOW_K", defaults::WINDOW_K as u32) as u8,
            n201: env_get("LAPD_N201", defaults::N201),
        }
    }

    pub fn new() -> Self {
        Self {
            t200: Duration::from_millis(defaults::T200_MS),
            t203: Duration::from_millis(defaults::T203_MS),
            n200: defaults::N200,
            window_k: defaults::WINDOW_K,
            n201: defaults::N201,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = LapdConfig::new();
        assert_eq!(cfg.t200, Duration::from_millis(1000));
        assert_eq!(cfg.t203, Duration::from_millis(10_000));
        assert_eq!(cfg.n200, 3);
        assert_eq!(cfg.window_k, 7);
    }
}
