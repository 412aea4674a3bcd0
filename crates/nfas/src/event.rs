//! Events and actions at the NFAS group manager's boundary. Every event
//! that might otherwise be raised with a string key (`"switchover"`,
//! `"groupInactive"`) is a concrete variant here instead.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchoverReason {
    ActiveLinkError,
    ActiveLinkReleased,
    HeartbeatLossThreshold,
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NfasEvent {
    /// The primary span established and the group became `Active`.
    GroupActive { span_id: u32 },
    SwitchoverCompleted { from: u32, to: u32, reason: SwitchoverReason },
    /// Every candidate span failed within `max_switchover_attempts`.
    GroupInactive { reason: SwitchoverReason },
    HeartbeatLost { span_id: u32, consecutive: u32 },
    /// The upstream queue overflowed during `Switching`; oldest messages
    /// were dropped to bound memory.
    QueueOverflow { dropped: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NfasAction {
    /// Octets to write to a specific span's D-channel.
    SendOnSpan { span_id: u32, octets: Vec<u8> },
    /// A reassembled SAPI-0 payload decoded on `span_id`, forwarded upward
    /// to call control regardless of which span in the group carried it.
    DataIndication { span_id: u32, payload: Vec<u8> },
    Emit(NfasEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfasConfigError {
    /// An NFAS group with no spans rejects `start`.
    EmptySpanList,
}

impl std::fmt::Display for NfasConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NfasConfigError::EmptySpanList => write!(f, "NFAS group requires at least one span"),
        }
    }
}

impl std::error::Error for NfasConfigError {}

impl From<NfasConfigError> for gerror::GError {
    fn from(err: NfasConfigError) -> Self {
        use gerror::codes::{ERR_CONFIG, SYS_NFAS, UC_CONFIGURE};
        let NfasConfigError::EmptySpanList = err;
        gerror::GError::simple(SYS_NFAS, ERR_CONFIG, UC_CONFIGURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_gerror_with_matching_code() {
        let gerr: gerror::GError = NfasConfigError::EmptySpanList.into();
        assert_eq!(gerr.system(), &gerror::codes::SYS_NFAS);
        assert_eq!(gerr.error_code(), &gerror::codes::ERR_CONFIG);
    }
}
