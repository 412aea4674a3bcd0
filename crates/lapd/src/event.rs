//! Events and actions at the LAPD engine's boundary.
//!
//! The engine is a pure state machine: each input produces a list of
//! `LapdAction`s the caller is responsible for carrying out (write bytes to
//! the D-channel, forward an event to the owning Call-Control SM or NFAS
//! group). This keeps timer side effects and state transitions explicit and
//! testable without a transport in the loop.

use crate::frame::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LapdErrorKind {
    EstablishmentFailed,
    LinkLost,
    PeerRejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LapdEvent {
    Established,
    Released,
    Error(LapdErrorKind),
    /// Reassembled SAPI-0 payload delivered to Call-Control (or forwarded
    /// unchanged upstream, for SAPI 63 link management).
    DataIndication(Vec<u8>),
    /// A frame failed to decode; logged and dropped, never torn down over.
    FrameDropped(FrameError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LapdAction {
    /// Octets to write to the D-channel.
    SendOctets(Vec<u8>),
    /// An event to forward to the owning Call-Control SM / NFAS group.
    Emit(LapdEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// `V(S) - V(A) (mod 128) >= window_k`; caller must wait for an
    /// acknowledgement before sending more.
    WindowFull,
    /// The link isn't `Established`.
    LinkNotUp,
    /// The peer last reported `RNR`; new I-frame transmission is
    /// suspended until an `RR`/`REJ` clears it (Q.921 §4.3, spec.md
    /// §4.B "honor peer-busy (RNR) by suspending new I transmissions").
    PeerBusy,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::WindowFull => write!(f, "I-frame window full"),
            SendError::LinkNotUp => write!(f, "data link is not established"),
            SendError::PeerBusy => write!(f, "peer reported RNR; new I transmissions suspended"),
        }
    }
}

impl std::error::Error for SendError {}

impl From<SendError> for gerror::GError {
    fn from(err: SendError) -> Self {
        use gerror::codes::{ERR_LINK_NOT_UP, ERR_PEER_BUSY, ERR_WINDOW_FULL, SYS_LAPD, UC_SEND};
        let error_code = match err {
            SendError::WindowFull => ERR_WINDOW_FULL,
            SendError::LinkNotUp => ERR_LINK_NOT_UP,
            SendError::PeerBusy => ERR_PEER_BUSY,
        };
        gerror::GError::simple(SYS_LAPD, error_code, UC_SEND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_error_converts_to_gerror_with_matching_code() {
        let gerr: gerror::GError = SendError::PeerBusy.into();
        assert_eq!(gerr.system(), &gerror::codes::SYS_LAPD);
        assert_eq!(gerr.error_code(), &gerror::codes::ERR_PEER_BUSY);
    }
}
