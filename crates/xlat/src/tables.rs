//! Per-variant cause-code, progress-indicator, and numbering-plan tables.
//! Loaded once per [`Variant`](crate::variant::Variant)
//! and treated as read-only; [`RuleSetStore`] is the one place an
//! operator-supplied override is allowed to replace entries, and it does
//! so as one atomic pointer swap so no reader ever observes a half
//! applied override.

use std::collections::HashMap;
use std::sync::Arc;

use gateway_core::SpinLock;

use crate::variant::Variant;

/// `q931::event::cause` / `isup::event::cause` re-derive the same Q.850
/// table; this crate names the codes it maps independently since it
/// treats them as opaque wire values, not call-control semantics.
pub mod cause {
    pub const UNALLOCATED_NUMBER: u8 = 1;
    pub const NORMAL_CLEARING: u8 = 16;
    pub const USER_BUSY: u8 = 17;
    pub const NO_USER_RESPONDING: u8 = 18;
    pub const NO_ANSWER: u8 = 19;
    pub const CALL_REJECTED: u8 = 21;
    pub const DESTINATION_OUT_OF_ORDER: u8 = 27;
    pub const NORMAL_UNSPECIFIED: u8 = 31;
    pub const NO_CIRCUIT_AVAILABLE: u8 = 34;
    pub const TEMPORARY_FAILURE: u8 = 41;
    pub const REQUESTED_CIRCUIT_UNAVAILABLE: u8 = 44;
}

/// Default cause used when a source cause has no table entry.
pub const DEFAULT_OUTBOUND_CAUSE: u8 = cause::NORMAL_UNSPECIFIED;
pub const DEFAULT_INBOUND_STATUS: u16 = 500;

#[derive(Debug, Clone)]
pub struct CauseEntry {
    pub status: u16,
    pub reason_text: &'static str,
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    variant: Variant,
    cause_to_sip: HashMap<u8, CauseEntry>,
    sip_to_cause: HashMap<u16, u8>,
    progress_to_sip: HashMap<u8, u16>,
}

impl RuleSet {
    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn cause_to_sip(&self, q850_cause: u8) -> (u16, &'static str) {
        self.cause_to_sip
            .get(&q850_cause)
            .map(|e| (e.status, e.reason_text))
            .unwrap_or((DEFAULT_INBOUND_STATUS, "Unspecified"))
    }

    pub fn sip_to_cause(&self, status: u16) -> u8 {
        self.sip_to_cause.get(&status).copied().unwrap_or(DEFAULT_OUTBOUND_CAUSE)
    }

    pub fn progress_to_sip(&self, indicator: u8) -> u16 {
        self.progress_to_sip.get(&indicator).copied().unwrap_or(183)
    }

    /// Built-in table for one variant. The three variants share the core
    /// Q.850 mapping; ANSI and ETSI differ only in a handful of
    /// entries their SS7/ISDN profiles define idiosyncratically.
    pub fn builtin(variant: Variant) -> Self {
        let mut cause_to_sip = HashMap::new();
        cause_to_sip.insert(cause::UNALLOCATED_NUMBER, CauseEntry { status: 404, reason_text: "Unallocated number" });
        cause_to_sip.insert(cause::NORMAL_CLEARING, CauseEntry { status: 200, reason_text: "Normal clearing" });
        cause_to_sip.insert(cause::USER_BUSY, CauseEntry { status: 486, reason_text: "User busy" });
        cause_to_sip.insert(cause::NO_USER_RESPONDING, CauseEntry { status: 480, reason_text: "No user responding" });
        cause_to_sip.insert(cause::NO_ANSWER, CauseEntry { status: 480, reason_text: "No answer from user" });
        cause_to_sip.insert(cause::CALL_REJECTED, CauseEntry { status: 603, reason_text: "Call rejected" });
        cause_to_sip.insert(cause::DESTINATION_OUT_OF_ORDER, CauseEntry { status: 502, reason_text: "Destination out of order" });
        cause_to_sip.insert(cause::NORMAL_UNSPECIFIED, CauseEntry { status: 500, reason_text: "Normal, unspecified" });
        cause_to_sip.insert(cause::NO_CIRCUIT_AVAILABLE, CauseEntry { status: 503, reason_text: "No circuit available" });
        cause_to_sip.insert(cause::TEMPORARY_FAILURE, CauseEntry { status: 500, reason_text: "Temporary failure" });
        cause_to_sip.insert(cause::REQUESTED_CIRCUIT_UNAVAILABLE, CauseEntry { status: 503, reason_text: "Requested circuit unavailable" });

        if variant == Variant::Ansi {
            // ANSI T1.113 routes "call rejected" to 403 rather than 603.
            cause_to_sip.insert(cause::CALL_REJECTED, CauseEntry { status: 403, reason_text: "Call rejected" });
        }

        let mut sip_to_cause = HashMap::new();
        sip_to_cause.insert(404, cause::UNALLOCATED_NUMBER);
        sip_to_cause.insert(480, cause::NO_ANSWER);
        sip_to_cause.insert(486, cause::USER_BUSY);
        sip_to_cause.insert(502, cause::DESTINATION_OUT_OF_ORDER);
        sip_to_cause.insert(503, cause::NO_CIRCUIT_AVAILABLE);
        sip_to_cause.insert(603, cause::CALL_REJECTED);
        if variant == Variant::Ansi {
            sip_to_cause.insert(403, cause::CALL_REJECTED);
        }

        // Q.931 progress indicator (IE 0x1E) low nibble -> SIP response.
        let mut progress_to_sip = HashMap::new();
        progress_to_sip.insert(1, 183); // not end-to-end ISDN
        progress_to_sip.insert(2, 183); // destination is non-ISDN
        progress_to_sip.insert(8, 183); // in-band information available

        Self { variant, cause_to_sip, sip_to_cause, progress_to_sip }
    }
}

/// Holds the live [`RuleSet`] for one variant behind an atomic pointer
/// swap so overrides never leave a reader mid-update.
pub struct RuleSetStore {
    current: SpinLock<Arc<RuleSet>>,
}

impl RuleSetStore {
    pub fn new(variant: Variant) -> Self {
        Self { current: SpinLock::new(Arc::new(RuleSet::builtin(variant))) }
    }

    pub fn load(&self) -> Arc<RuleSet> {
        Arc::clone(&self.current.lock())
    }

    /// Append or replace one cause-code entry, atomically relative to
    /// concurrent [`load`](Self::load) calls.
    pub fn override_cause(&self, q850_cause: u8, status: u16, reason_text: &'static str) {
        let mut guard = self.current.lock();
        let mut next = (**guard).clone();
        next.cause_to_sip.insert(q850_cause, CauseEntry { status, reason_text });
        next.sip_to_cause.insert(status, q850_cause);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_cause_falls_back_to_defaults() {
        let rules = RuleSet::builtin(Variant::Itu);
        assert_eq!(rules.cause_to_sip(250).0, DEFAULT_INBOUND_STATUS);
    }

    #[test]
    fn known_status_codes_map_to_expected_causes() {
        // 486->17, 480->19, 404->1, 503->34.
        let rules = RuleSet::builtin(Variant::Itu);
        assert_eq!(rules.sip_to_cause(486), cause::USER_BUSY);
        assert_eq!(rules.sip_to_cause(480), cause::NO_ANSWER);
        assert_eq!(rules.sip_to_cause(404), cause::UNALLOCATED_NUMBER);
        assert_eq!(rules.sip_to_cause(503), cause::NO_CIRCUIT_AVAILABLE);
    }

    #[test]
    fn ansi_variant_diverges_on_call_rejected() {
        let itu = RuleSet::builtin(Variant::Itu);
        let ansi = RuleSet::builtin(Variant::Ansi);
        assert_eq!(itu.cause_to_sip(cause::CALL_REJECTED).0, 603);
        assert_eq!(ansi.cause_to_sip(cause::CALL_REJECTED).0, 403);
    }

    #[test]
    fn override_is_visible_to_subsequent_loads() {
        let store = RuleSetStore::new(Variant::Itu);
        store.override_cause(99, 410, "Custom gone");
        assert_eq!(store.load().cause_to_sip(99), (410, "Custom gone"));
    }
}
