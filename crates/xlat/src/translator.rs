//! Stateless mapping between Q.931/ISUP events and SIP messages.
//!
//! Every function here is a pure translation: source protocol input plus
//! a [`TranslationContext`], target protocol output. No state is kept
//! between calls — the call-control and ISUP state machines upstream
//! already own the state this needs.

use isup::cic::CicDirection;
use isup::event::IsupEvent;
use isup::message::IsupMessage;
use q931::event::CallControlEvent;

use crate::context::TranslationContext;
use crate::sip::{SdpOffer, SipMessage};
use crate::tables::RuleSet;

const MULTIPART_BOUNDARY: &str = "gw-boundary";

fn sip_uri(user: &str, ctx: &TranslationContext) -> String {
    format!("sip:{user}@{host}", host = ctx.local_rtp_ip)
}

/// Q.931 call-control event -> SIP request/response, for an FAS/NFAS
/// line. Returns `None` for events that
/// don't correspond to a SIP message on their own (e.g. `StatusAccepted`).
pub fn q931_event_to_sip(event: &CallControlEvent, ctx: &TranslationContext, rules: &RuleSet) -> Option<SipMessage> {
    match event {
        CallControlEvent::InboundSetup { calling, called } => {
            let from_user = calling.clone().unwrap_or_else(|| "anonymous".to_string());
            let to_user = called.clone().unwrap_or_default();
            let sdp = ctx.local_rtp_port.map(|port| SdpOffer::speech(&ctx.local_rtp_ip, port));
            let mut msg = SipMessage::request("INVITE", sip_uri(&to_user, ctx))
                .with_header("From", sip_uri(&from_user, ctx))
                .with_header("To", sip_uri(&to_user, ctx))
                .with_header("Call-ID", ctx.sip_call_id.clone());
            if let Some(sdp) = sdp {
                msg = msg.with_header("Content-Type", "application/sdp").with_body(sdp.encode());
            }
            Some(msg)
        }
        CallControlEvent::Proceeding => Some(SipMessage::response(100, "Trying")),
        CallControlEvent::Alerting => Some(SipMessage::response(180, "Ringing")),
        CallControlEvent::Connected => {
            let sdp = ctx.local_rtp_port.map(|port| SdpOffer::speech(&ctx.local_rtp_ip, port));
            let mut msg = SipMessage::response(200, "OK").with_header("Call-ID", ctx.sip_call_id.clone());
            if let Some(sdp) = sdp {
                msg = msg.with_header("Content-Type", "application/sdp").with_body(sdp.encode());
            }
            Some(msg)
        }
        CallControlEvent::Cleared { cause } => Some(cause_to_teardown(*cause, rules)),
        CallControlEvent::StatusAccepted | CallControlEvent::OverlapDigits { .. } => None,
    }
}

/// A cleared call becomes either a `BYE` (normal clearing, cause 16) or
/// the variant's mapped failure response.
fn cause_to_teardown(cause: u8, rules: &RuleSet) -> SipMessage {
    if cause == q931::event::cause::NORMAL_CLEARING {
        SipMessage::request("BYE", "").with_header("Reason", format!("Q.850;cause={cause}"))
    } else {
        let (status, text) = rules.cause_to_sip(cause);
        SipMessage::response(status, text).with_header("Reason", format!("Q.850;cause={cause};text=\"{text}\""))
    }
}

/// SIP status code -> outbound Q.850 cause, for the reverse direction,
/// symmetric with the Q.931/ISUP -> SIP mapping above.
pub fn sip_status_to_cause(status: u16, rules: &RuleSet) -> u8 {
    rules.sip_to_cause(status)
}

/// ISUP event -> SIP (ACM/ANM/REL legs). `IAM` has its own entry point,
/// [`isup_iam_to_invite`], since it needs
/// the original message to build the SIP-T tunnel body.
pub fn isup_event_to_sip(event: &IsupEvent, rules: &RuleSet) -> Option<SipMessage> {
    match event {
        IsupEvent::InboundSetup { .. } => None,
        IsupEvent::Proceeding { .. } => Some(SipMessage::response(183, "Session Progress")),
        IsupEvent::Answered { .. } => Some(SipMessage::response(200, "OK")),
        IsupEvent::Released { cause, direction, answered, .. } => {
            let (status, text) = rules.cause_to_sip(*cause);
            if *answered || *direction == CicDirection::Incoming {
                // Already connected, or this leg came in from the ISUP
                // trunk (SIP placed no INVITE of its own yet to answer
                // with a final response) — end the dialog with a BYE.
                Some(SipMessage::request("BYE", "").with_header("Reason", format!("Q.850;cause={cause};text=\"{text}\"")).with_header("X-Mapped-Status", status.to_string()))
            } else {
                // SIP originated this leg (an inbound INVITE caused the
                // gateway to place this outgoing IAM) and it never got
                // answered: the REL is the final outcome of that INVITE,
                // so it becomes a status response rather than a mid-dialog BYE.
                Some(SipMessage::response(status, text).with_header("Reason", format!("Q.850;cause={cause};text=\"{text}\"")))
            }
        }
        IsupEvent::Idle { .. } | IsupEvent::UnknownMessage { .. } | IsupEvent::Glare { .. } => None,
    }
}

/// `IAM` -> `INVITE` with a SIP-T body: `multipart/mixed` carrying an SDP
/// part and an `application/ISUP` part with the original IAM parameters
/// untouched, `content-disposition: signal;handling=required`.
pub fn isup_iam_to_invite(msg: &IsupMessage, ctx: &TranslationContext) -> Option<SipMessage> {
    let IsupMessage::Iam { cic, calling, called, .. } = msg else { return None };

    let from_user = calling.clone().unwrap_or_else(|| "anonymous".to_string());
    let mut request = SipMessage::request("INVITE", sip_uri(called, ctx))
        .with_header("From", sip_uri(&from_user, ctx))
        .with_header("To", sip_uri(called, ctx))
        .with_header("Call-ID", ctx.sip_call_id.clone())
        .with_header("X-Isup-Cic", cic.to_string())
        .with_header("Content-Type", format!("multipart/mixed;boundary={MULTIPART_BOUNDARY}"));

    let sdp = ctx.local_rtp_port.map(|port| SdpOffer::speech(&ctx.local_rtp_ip, port).encode()).unwrap_or_default();
    let isup_body = msg.encode();

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\nContent-Type: application/sdp\r\n\r\n").as_bytes());
    body.extend_from_slice(&sdp);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}\r\nContent-Type: application/ISUP\r\nContent-Disposition: signal;handling=required\r\n\r\n").as_bytes());
    body.extend_from_slice(&isup_body);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    request = request.with_body(body);
    Some(request)
}

/// Overlap-sending digits accumulated by Q.931 (`OverlapDigits`) don't
/// become a SIP message until the call is present in full — callers
/// should hold them and translate only the eventual `InboundSetup`.
pub fn is_overlap_in_progress(event: &CallControlEvent) -> bool {
    matches!(event, CallControlEvent::OverlapDigits { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Variant;

    fn ctx() -> TranslationContext {
        TranslationContext::new(Variant::Itu, "call-id-1", "10.0.0.5").with_local_port(20_000)
    }

    #[test]
    fn scenario_1_inbound_setup_becomes_invite_with_sdp() {
        let rules = RuleSet::builtin(Variant::Itu);
        let event = CallControlEvent::InboundSetup { calling: Some("5551001".into()), called: Some("5551002".into()) };
        let msg = q931_event_to_sip(&event, &ctx(), &rules).unwrap();
        match msg {
            SipMessage::Request { method, headers, body, .. } => {
                assert_eq!(method, "INVITE");
                assert!(headers.get("From").unwrap().contains("5551001"));
                assert!(headers.get("To").unwrap().contains("5551002"));
                let sdp = String::from_utf8(body).unwrap();
                assert!(sdp.contains("m=audio 20000"));
            }
            _ => panic!("expected a request"),
        }
    }

    #[test]
    fn call_proceeding_becomes_100_trying() {
        let rules = RuleSet::builtin(Variant::Itu);
        let msg = q931_event_to_sip(&CallControlEvent::Proceeding, &ctx(), &rules).unwrap();
        assert_eq!(msg, SipMessage::response(100, "Trying"));
    }

    #[test]
    fn scenario_4_user_busy_release_becomes_busy_here() {
        // REL cause=17 (user busy) on a gateway-originated, unanswered
        // leg (SIP placed the call): ITU variant.
        let rules = RuleSet::builtin(Variant::Itu);
        let event = IsupEvent::Released { cic: 7, cause: 17, direction: CicDirection::Outgoing, answered: false };
        let msg = isup_event_to_sip(&event, &rules).unwrap();
        match msg {
            SipMessage::Response { status, headers, .. } => {
                assert_eq!(status, 486);
                assert_eq!(headers.get("Reason").unwrap(), "Q.850;cause=17;text=\"User busy\"");
            }
            _ => panic!("expected a 486 Busy Here response"),
        }
    }

    #[test]
    fn user_busy_after_answer_still_becomes_bye() {
        // Same cause, but the call had already connected: always a BYE.
        let rules = RuleSet::builtin(Variant::Itu);
        let event = IsupEvent::Released { cic: 7, cause: 17, direction: CicDirection::Outgoing, answered: true };
        let msg = isup_event_to_sip(&event, &rules).unwrap();
        assert!(matches!(msg, SipMessage::Request { ref method, .. } if method == "BYE"));
    }

    #[test]
    fn isup_originated_unanswered_release_is_still_a_bye() {
        // The ISUP trunk placed this call (incoming IAM); SIP has no
        // INVITE of its own pending to answer with a final response.
        let rules = RuleSet::builtin(Variant::Itu);
        let event = IsupEvent::Released { cic: 7, cause: 17, direction: CicDirection::Incoming, answered: false };
        let msg = isup_event_to_sip(&event, &rules).unwrap();
        assert!(matches!(msg, SipMessage::Request { ref method, .. } if method == "BYE"));
    }

    #[test]
    fn normal_clearing_becomes_bye_not_a_status_response() {
        let rules = RuleSet::builtin(Variant::Itu);
        let msg = q931_event_to_sip(&CallControlEvent::Cleared { cause: 16 }, &ctx(), &rules).unwrap();
        assert!(matches!(msg, SipMessage::Request { ref method, .. } if method == "BYE"));
    }

    #[test]
    fn reverse_mapping_maps_sip_status_to_cause() {
        let rules = RuleSet::builtin(Variant::Itu);
        assert_eq!(sip_status_to_cause(486, &rules), 17);
        assert_eq!(sip_status_to_cause(480, &rules), 19);
        assert_eq!(sip_status_to_cause(404, &rules), 1);
        assert_eq!(sip_status_to_cause(503, &rules), 34);
    }

    #[test]
    fn iam_becomes_invite_with_tunneled_isup_body() {
        let msg = IsupMessage::Iam { cic: 42, calling: Some("5551001".into()), called: "5551002".into(), optional: vec![] };
        let invite = isup_iam_to_invite(&msg, &ctx()).unwrap();
        match invite {
            SipMessage::Request { headers, body, .. } => {
                assert!(headers.get("Content-Type").unwrap().starts_with("multipart/mixed"));
                let body_str = String::from_utf8_lossy(&body);
                assert!(body_str.contains("application/ISUP"));
                assert!(body_str.contains("handling=required"));
                assert!(body_str.contains("application/sdp"));
            }
            _ => panic!("expected a request"),
        }
    }

    #[test]
    fn unknown_cause_falls_back_to_normal_unspecified_outbound_and_500_inbound() {
        let rules = RuleSet::builtin(Variant::Itu);
        let msg = q931_event_to_sip(&CallControlEvent::Cleared { cause: 250 }, &ctx(), &rules).unwrap();
        assert!(matches!(msg, SipMessage::Response { status: 500, .. }));
    }
}
