//! Events and actions at the Call-Control state machine's boundary, and
//! the Q.850 cause constants this crate and its callers share.

use crate::message::{CallReference, Message};

/// Q.850 cause values this codebase names explicitly; any other value is
/// carried as a raw `u8` at the call sites that use it.
pub mod cause {
    pub const UNALLOCATED_NUMBER: u8 = 1;
    pub const NO_CIRCUIT_AVAILABLE: u8 = 34;
    pub const NORMAL_CLEARING: u8 = 16;
    pub const USER_BUSY: u8 = 17;
    pub const NO_USER_RESPONDING: u8 = 18;
    pub const NO_ANSWER: u8 = 19;
    pub const CALL_REJECTED: u8 = 21;
    pub const DESTINATION_OUT_OF_ORDER: u8 = 27;
    pub const INVALID_CALL_REFERENCE: u8 = 81;
    pub const TEMPORARY_FAILURE: u8 = 41;
    pub const REQUESTED_CIRCUIT_UNAVAILABLE: u8 = 44;
    pub const NORMAL_UNSPECIFIED: u8 = 31;
    pub const RECOVERY_ON_TIMER_EXPIRY: u8 = 102;
    pub const MESSAGE_INCOMPATIBLE_WITH_CALL_STATE: u8 = 101;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallControlTimerKind {
    T301,
    T303,
    T305,
    T308,
    T310,
    T302,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallControlEvent {
    /// A new inbound SETUP arrived; the owner should allocate a B-channel
    /// and, in the gateway, hand this to the protocol translator.
    InboundSetup { calling: Option<String>, called: Option<String> },
    Proceeding,
    Alerting,
    Connected,
    /// Local clearing completed; the call reference is now free to reuse.
    Cleared { cause: u8 },
    /// STATUS received while compatible with the current state: accepted
    /// silently, but surfaced for diagnostics.
    StatusAccepted,
    /// Overlap-received digits accumulated so far.
    OverlapDigits { accumulated: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallControlAction {
    Send(Message),
    Emit(CallControlEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginatingSide {
    /// This endpoint sent the initial SETUP.
    Local,
    /// The initial SETUP arrived from the peer.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glare;

/// Resolve simultaneous seizure of the same B-channel (glare): the side
/// with the larger call reference value wins.
pub fn resolve_glare(local_ref: CallReference, remote_ref: CallReference) -> OriginatingSide {
    if local_ref.value >= remote_ref.value {
        OriginatingSide::Local
    } else {
        OriginatingSide::Remote
    }
}
