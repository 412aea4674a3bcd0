//! ISUP handler configuration: the CIC range this handler draws from.

use gateway_core::env::env_get;

mod defaults {
    pub const CIC_MIN: u16 = 1;
    pub const CIC_MAX: u16 = 1000;
    pub const POINT_CODE: u32 = 1;
}

#[derive(Debug, Clone, Copy)]
pub struct IsupConfig {
    /// Inclusive CIC range (default: 1..1000).
    pub cic_min: u16,
    pub cic_max: u16,
    /// This side's SS7 point code, used to break glare: the side with
    /// the higher point code wins a simultaneous CIC seizure.
    pub point_code: u32,
}

impl Default for IsupConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl IsupConfig {
    /// `ISUP_CIC_MIN`, `ISUP_CIC_MAX`, `ISUP_POINT_CODE`.
    pub fn from_env() -> Self {
        Self {
            cic_min: env_get("ISUP_CIC_MIN", defaults::CIC_MIN),
            cic_max: env_get("ISUP_CIC_MAX", defaults::CIC_MAX),
            point_code: env_get("ISUP_POINT_CODE", defaults::POINT_CODE),
        }
    }

    pub fn new() -> Self {
        Self { cic_min: defaults::CIC_MIN, cic_max: defaults::CIC_MAX, point_code: defaults::POINT_CODE }
    }

    pub fn count(&self) -> usize {
        (self.cic_max - self.cic_min + 1) as usize
    }
}
