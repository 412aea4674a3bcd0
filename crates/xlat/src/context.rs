//! Per-call translation context: the session's fixed identifiers and
//! the switch variant its first translation settled on.

use crate::variant::Variant;

#[derive(Debug, Clone)]
pub struct TranslationContext {
    /// Fixed by the session's first translation; never changed after
    /// that — a session's first translation fixes the variant for the
    /// rest of its lifetime.
    pub variant: Variant,
    pub sip_call_id: String,
    pub local_rtp_ip: String,
    pub local_rtp_port: Option<u16>,
    /// Set once the SIP side has answered with its own offer/answer.
    pub remote_rtp_ip: Option<String>,
    pub remote_rtp_port: Option<u16>,
}

impl TranslationContext {
    pub fn new(variant: Variant, sip_call_id: impl Into<String>, local_rtp_ip: impl Into<String>) -> Self {
        Self {
            variant,
            sip_call_id: sip_call_id.into(),
            local_rtp_ip: local_rtp_ip.into(),
            local_rtp_port: None,
            remote_rtp_ip: None,
            remote_rtp_port: None,
        }
    }

    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_rtp_port = Some(port);
        self
    }
}
