//! Even/odd RTP+RTCP port pair allocator.

use gateway_core::idpool::IdPool;

use crate::config::{RtpConfig, RtpConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    pub rtp: u16,
    pub rtcp: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpPoolError {
    NoPortsAvailable,
}

impl std::fmt::Display for RtpPoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RtpPoolError::NoPortsAvailable => write!(f, "no RTP port pairs available"),
        }
    }
}

impl std::error::Error for RtpPoolError {}

impl From<RtpPoolError> for gerror::GError {
    fn from(err: RtpPoolError) -> Self {
        use gerror::codes::{ERR_NO_PORTS_AVAILABLE, SYS_RTP, UC_ALLOCATE};
        let RtpPoolError::NoPortsAvailable = err;
        gerror::GError::simple(SYS_RTP, ERR_NO_PORTS_AVAILABLE, UC_ALLOCATE)
    }
}

/// Pool of RTP/RTCP port pairs over `[port_min, port_max]`, stepped by 2,
/// allocated lowest-first. RTCP's port is never allocated independently —
/// it is always `rtp + 1`, derived rather than tracked.
pub struct PortPool {
    ids: IdPool,
    min: u16,
}

impl PortPool {
    pub fn new(config: &RtpConfig) -> Result<Self, RtpConfigError> {
        config.validate()?;
        Ok(Self { ids: IdPool::new(config.pair_count()), min: config.port_min })
    }

    fn pair_for(&self, idx: usize) -> PortPair {
        let rtp = self.min + (idx as u16) * 2;
        PortPair { rtp, rtcp: rtp + 1 }
    }

    pub fn allocate(&self) -> Result<PortPair, RtpPoolError> {
        self.ids.allocate().map(|idx| self.pair_for(idx)).ok_or(RtpPoolError::NoPortsAvailable)
    }

    /// Release a pair by its RTP port (the pair's primary key).
    pub fn release(&self, rtp_port: u16) {
        if rtp_port >= self.min && (rtp_port - self.min) % 2 == 0 {
            self.ids.release(((rtp_port - self.min) / 2) as usize);
        }
    }

    pub fn free_pairs(&self) -> usize {
        self.ids.free_count()
    }

    pub fn capacity(&self) -> usize {
        self.ids.capacity()
    }
}
