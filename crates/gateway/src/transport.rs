//! Transport boundary: the TDM frame source/sink and the SIP collaborator
//! the core depends on only through a trait.
//!
//! Production wiring binds [`TdmTransport`] to the hardware-abstraction
//! driver and [`SipTransport`] to a real SIP stack's transaction layer;
//! neither is implemented here. [`InMemoryTdmTransport`] and
//! [`InMemorySipTransport`] are the deterministic test doubles every
//! integration test in this crate drives the supervisor with.

use std::collections::VecDeque;
use std::sync::Mutex;

use xlat::SipMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The named span/channel has no binding (production: not provisioned
    /// on the hardware; test double: never registered).
    Unbound,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Unbound => write!(f, "span has no transport binding"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for gerror::GError {
    fn from(err: TransportError) -> Self {
        use gerror::codes::{ERR_TRANSPORT_UNBOUND, SYS_TRANSPORT, UC_SEND};
        let TransportError::Unbound = err;
        gerror::GError::simple(SYS_TRANSPORT, ERR_TRANSPORT_UNBOUND, UC_SEND)
    }
}

/// One physical D-channel span: raw octets in, raw octets out. A single
/// implementor typically serves every span the gateway knows about,
/// distinguishing them by `span_id`.
pub trait TdmTransport: Send + Sync {
    fn send(&self, span_id: u32, octets: &[u8]) -> Result<(), TransportError>;
    /// Drain one inbound frame queued for `span_id`, if any. Returns
    /// `None` when there's nothing waiting right now, not an error —
    /// callers poll this from their task loop.
    fn try_recv(&self, span_id: u32) -> Option<Vec<u8>>;
}

/// The SIP side: one gateway instance is assumed to front a single SIP
/// transaction layer, so there's no per-call addressing here — message
/// routing within that layer is the collaborator's job, not this crate's.
pub trait SipTransport: Send + Sync {
    fn send(&self, msg: SipMessage);
    fn try_recv(&self) -> Option<SipMessage>;
}

#[derive(Default)]
struct InMemoryTdmInner {
    inbound: std::collections::HashMap<u32, VecDeque<Vec<u8>>>,
    sent: Vec<(u32, Vec<u8>)>,
}

/// Loopback-free in-memory double: `inject` feeds octets as if they
/// arrived on the wire, `sent_frames` inspects what the gateway wrote.
/// Every span is implicitly bound — there is no `Unbound` case to
/// exercise against this double.
pub struct InMemoryTdmTransport {
    inner: Mutex<InMemoryTdmInner>,
}

impl InMemoryTdmTransport {
    pub fn new() -> Self {
        Self { inner: Mutex::new(InMemoryTdmInner::default()) }
    }

    pub fn inject(&self, span_id: u32, octets: Vec<u8>) {
        self.inner.lock().unwrap().inbound.entry(span_id).or_default().push_back(octets);
    }

    pub fn sent_frames(&self) -> Vec<(u32, Vec<u8>)> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<(u32, Vec<u8>)> {
        std::mem::take(&mut self.inner.lock().unwrap().sent)
    }
}

impl Default for InMemoryTdmTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TdmTransport for InMemoryTdmTransport {
    fn send(&self, span_id: u32, octets: &[u8]) -> Result<(), TransportError> {
        self.inner.lock().unwrap().sent.push((span_id, octets.to_vec()));
        Ok(())
    }

    fn try_recv(&self, span_id: u32) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().inbound.get_mut(&span_id).and_then(|q| q.pop_front())
    }
}

#[derive(Default)]
struct InMemorySipInner {
    inbound: VecDeque<SipMessage>,
    sent: Vec<SipMessage>,
}

pub struct InMemorySipTransport {
    inner: Mutex<InMemorySipInner>,
}

impl InMemorySipTransport {
    pub fn new() -> Self {
        Self { inner: Mutex::new(InMemorySipInner::default()) }
    }

    pub fn inject(&self, msg: SipMessage) {
        self.inner.lock().unwrap().inbound.push_back(msg);
    }

    pub fn sent_messages(&self) -> Vec<SipMessage> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<SipMessage> {
        std::mem::take(&mut self.inner.lock().unwrap().sent)
    }
}

impl Default for InMemorySipTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SipTransport for InMemorySipTransport {
    fn send(&self, msg: SipMessage) {
        self.inner.lock().unwrap().sent.push(msg);
    }

    fn try_recv(&self) -> Option<SipMessage> {
        self.inner.lock().unwrap().inbound.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_tdm_octets_are_received_once() {
        let tdm = InMemoryTdmTransport::new();
        tdm.inject(1, vec![1, 2, 3]);
        assert_eq!(tdm.try_recv(1), Some(vec![1, 2, 3]));
        assert_eq!(tdm.try_recv(1), None);
    }

    #[test]
    fn sent_tdm_octets_are_recorded_per_span() {
        let tdm = InMemoryTdmTransport::new();
        tdm.send(1, &[9, 9]).unwrap();
        tdm.send(2, &[1]).unwrap();
        assert_eq!(tdm.sent_frames(), vec![(1, vec![9, 9]), (2, vec![1])]);
    }

    #[test]
    fn sip_double_records_sent_and_replays_injected() {
        let sip = InMemorySipTransport::new();
        sip.inject(SipMessage::response(100, "Trying"));
        assert_eq!(sip.try_recv(), Some(SipMessage::response(100, "Trying")));
        assert!(sip.try_recv().is_none());

        sip.send(SipMessage::request("INVITE", "sip:1@h"));
        assert_eq!(sip.sent_messages().len(), 1);
    }

    #[test]
    fn transport_error_converts_to_gerror_with_matching_code() {
        let gerr: gerror::GError = TransportError::Unbound.into();
        assert_eq!(gerr.system(), &gerror::codes::SYS_TRANSPORT);
        assert_eq!(gerr.error_code(), &gerror::codes::ERR_TRANSPORT_UNBOUND);
    }
}
