//! A session record: the four-way correlation key.

use std::time::Instant;

use rtp::PortPair;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub call_ref: Option<u16>,
    pub cic: Option<u16>,
    pub sip_call_id: Option<String>,
    pub rtp_port: Option<u16>,
}

impl SessionKey {
    pub fn new() -> Self {
        Self { call_ref: None, cic: None, sip_call_id: None, rtp_port: None }
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique, monotonically issued handle to a session record. Not
/// meaningful outside the registry that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub call_ref: Option<u16>,
    pub cic: Option<u16>,
    pub sip_call_id: Option<String>,
    pub rtp_pair: Option<PortPair>,
    pub started_at: Instant,
    pub answered_at: Option<Instant>,
    /// Last cause code observed for this session, carried for the
    /// eventual `CallEventRecord`.
    pub cause: Option<u8>,
}

impl SessionRecord {
    pub fn new(id: SessionId, key: SessionKey, rtp_pair: Option<PortPair>) -> Self {
        Self {
            id,
            call_ref: key.call_ref,
            cic: key.cic,
            sip_call_id: key.sip_call_id,
            rtp_pair,
            started_at: Instant::now(),
            answered_at: None,
            cause: None,
        }
    }
}

/// One of the four correlation slots, named so a caller can release
/// exactly the slot it owns without touching the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    CallRef,
    Cic,
    SipCallId,
    RtpPort,
}
