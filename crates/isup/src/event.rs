//! Events and actions at the ISUP handler's boundary.

use crate::cic::CicDirection;
use crate::message::IsupMessage;

/// Q.850 cause values this crate names explicitly.
pub mod cause {
    pub const USER_BUSY: u8 = 17;
    pub const NORMAL_CLEARING: u8 = 16;
    pub const REQUESTED_CIRCUIT_UNAVAILABLE: u8 = 44;
    pub const NO_CIRCUIT_AVAILABLE: u8 = 34;
    pub const NORMAL_UNSPECIFIED: u8 = 31;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsupEvent {
    /// An inbound IAM arrived; the gateway allocates media and hands this
    /// to the protocol translator.
    InboundSetup { cic: u16, calling: Option<String>, called: String },
    Proceeding { cic: u16 },
    Answered { cic: u16 },
    /// `direction`/`answered` describe the CIC call as it stood just
    /// before this release, so a translator can tell a pre-answer
    /// clearing of a gateway-originated leg (SIP side placed the call;
    /// a `REL` here means SIP never got further than ringing) from a
    /// post-answer hangup (always a `BYE` regardless of cause).
    Released { cic: u16, cause: u8, direction: CicDirection, answered: bool },
    /// The CIC returned to the pool after RLC.
    Idle { cic: u16 },
    /// A message type this codec doesn't recognize; per-CIC state is
    /// untouched.
    UnknownMessage { cic: u16, message_type: u8 },
    /// Simultaneous seizure of the same CIC from both sides (glare); the
    /// loser must reallocate and retry.
    Glare { cic: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsupAction {
    Send(IsupMessage),
    Emit(IsupEvent),
}
