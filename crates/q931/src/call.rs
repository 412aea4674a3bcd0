//! Per-call Q.931 call-control state machine.
//!
//! Mirrors `lapd::engine::LapdEngine`'s shape: a pure state machine driven
//! by inbound messages and timer firings, returning a list of actions
//! (messages to send, events to emit upward) rather than performing I/O.

use gateway_core::id::TaskId;
use gateway_runtime::timer::{ExpiredTimer, TimerHandle, TimerKind, TimerRegistry};

use crate::config::CallControlConfig;
use crate::event::{cause, CallControlAction, CallControlEvent, OriginatingSide};
use crate::message::{CallReference, Ie, Message, MessageType};

/// Q.931 §5 call states; the numeric suffixes are ITU's own state numbers,
/// kept in the variant names since that's how interop traces refer to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Null,
    CallInitiated,
    OverlapSending,
    OutgoingCallProceeding,
    CallDelivered,
    CallPresent,
    CallReceived,
    ConnectRequest,
    IncomingCallProceeding,
    Active,
    DisconnectRequest,
    DisconnectIndication,
    ReleaseRequest,
    OverlapReceiving,
}

pub struct CallControlSm {
    call_ref: CallReference,
    state: CallState,
    side: OriginatingSide,
    calling_number: Option<String>,
    called_number: Option<String>,
    selected_bchannel: Option<u8>,
    sip_call_id: Option<String>,
    last_cause: Option<u8>,
    overlap_digits: String,
    t303_retry: bool,
    config: CallControlConfig,
    task: TaskId,
    timers: TimerRegistry,
    active_timer: Option<TimerHandle>,
}

impl CallControlSm {
    pub fn new(call_ref: CallReference, task: TaskId, config: CallControlConfig, timers: TimerRegistry) -> Self {
        Self {
            call_ref,
            state: CallState::Null,
            side: OriginatingSide::Local,
            calling_number: None,
            called_number: None,
            selected_bchannel: None,
            sip_call_id: None,
            last_cause: None,
            overlap_digits: String::new(),
            t303_retry: false,
            config,
            task,
            timers,
            active_timer: None,
        }
    }

    pub fn call_ref(&self) -> CallReference {
        self.call_ref
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn side(&self) -> OriginatingSide {
        self.side
    }

    pub fn sip_call_id(&self) -> Option<&str> {
        self.sip_call_id.as_deref()
    }

    pub fn set_sip_call_id(&mut self, id: String) {
        self.sip_call_id = Some(id);
    }

    pub fn last_cause(&self) -> Option<u8> {
        self.last_cause
    }

    fn start_timer(&mut self, kind: TimerKind, duration: std::time::Duration) {
        self.cancel_timer();
        self.active_timer = Some(self.timers.schedule(self.task, kind, duration));
    }

    fn cancel_timer(&mut self) {
        if let Some(h) = self.active_timer.take() {
            self.timers.cancel(h);
        }
    }

    /// Begin an outbound call (local origination): send SETUP, enter
    /// `CallInitiated`, arm T303.
    pub fn originate(&mut self, calling: String, called: String) -> Vec<CallControlAction> {
        self.side = OriginatingSide::Local;
        self.calling_number = Some(calling.clone());
        self.called_number = Some(called.clone());
        self.state = CallState::CallInitiated;

        let msg = Message::new(self.call_ref, MessageType::Setup)
            .with_ie(Ie::bearer_capability_speech())
            .with_ie(Ie::calling_party_number(&calling))
            .with_ie(Ie::called_party_number(&called))
            .with_ie(Ie::sending_complete());

        self.start_timer(TimerKind::T303, self.config.t303);
        vec![CallControlAction::Send(msg)]
    }

    /// Handle an inbound SETUP: enter `CallPresent`, surface the new call
    /// upward (the gateway translates it to an INVITE).
    pub fn handle_inbound_setup(&mut self, msg: &Message) -> Vec<CallControlAction> {
        self.side = OriginatingSide::Remote;
        self.state = CallState::CallPresent;
        self.calling_number = msg.calling_number();
        self.called_number = msg.called_number();

        if msg.ie(crate::message::IE_SENDING_COMPLETE).is_none() {
            // Overlap receiving: accumulate until ST or T302 expiry.
            self.state = CallState::OverlapReceiving;
            self.overlap_digits = self.called_number.clone().unwrap_or_default();
            self.start_timer(TimerKind::T302, self.config.t302);
            return vec![CallControlAction::Emit(CallControlEvent::OverlapDigits {
                accumulated: self.overlap_digits.clone(),
            })];
        }

        vec![CallControlAction::Emit(CallControlEvent::InboundSetup {
            calling: self.calling_number.clone(),
            called: self.called_number.clone(),
        })]
    }

    /// Additional digits during overlap receiving (Q.931 INFORMATION).
    pub fn handle_overlap_digits(&mut self, digits: &str, sending_complete: bool) -> Vec<CallControlAction> {
        if self.state != CallState::OverlapReceiving {
            return Vec::new();
        }
        self.overlap_digits.push_str(digits);
        if sending_complete {
            self.cancel_timer();
            self.state = CallState::CallPresent;
            self.called_number = Some(self.overlap_digits.clone());
            return vec![CallControlAction::Emit(CallControlEvent::InboundSetup {
                calling: self.calling_number.clone(),
                called: self.called_number.clone(),
            })];
        }
        self.start_timer(TimerKind::T302, self.config.t302);
        vec![CallControlAction::Emit(CallControlEvent::OverlapDigits { accumulated: self.overlap_digits.clone() })]
    }

    /// Local side accepts the inbound call (translator got a 1xx/2xx from
    /// SIP) and sends CALL PROCEEDING.
    pub fn accept_incoming(&mut self, bchannel: u8) -> Vec<CallControlAction> {
        self.selected_bchannel = Some(bchannel);
        self.state = CallState::IncomingCallProceeding;
        vec![CallControlAction::Send(Message::new(self.call_ref, MessageType::CallProceeding))]
    }

    pub fn send_alerting(&mut self) -> Vec<CallControlAction> {
        self.state = CallState::CallReceived;
        vec![CallControlAction::Send(Message::new(self.call_ref, MessageType::Alerting))]
    }

    pub fn send_connect(&mut self) -> Vec<CallControlAction> {
        self.state = CallState::ConnectRequest;
        vec![CallControlAction::Send(Message::new(self.call_ref, MessageType::Connect))]
    }

    /// Dispatch one inbound Q.931 message against the current state.
    pub fn handle_message(&mut self, msg: &Message) -> Vec<CallControlAction> {
        match msg.message_type {
            MessageType::Setup => self.handle_inbound_setup(msg),
            MessageType::CallProceeding => self.on_call_proceeding(),
            MessageType::Alerting => self.on_alerting(),
            MessageType::Connect => self.on_connect(),
            MessageType::ConnectAcknowledge => Vec::new(),
            MessageType::Disconnect => self.on_disconnect(msg),
            MessageType::Release => self.on_release(msg),
            MessageType::ReleaseComplete => self.on_release_complete(msg),
            MessageType::Status => self.on_status(msg),
            MessageType::StatusEnquiry => self.on_status_enquiry(),
            MessageType::Progress => Vec::new(),
            MessageType::SetupAcknowledge => Vec::new(),
            MessageType::Information => Vec::new(),
            MessageType::Unknown(_) => {
                vec![CallControlAction::Send(
                    Message::new(self.call_ref, MessageType::Status).with_ie(Ie::cause(cause::MESSAGE_INCOMPATIBLE_WITH_CALL_STATE, 0)),
                )]
            }
        }
    }

    fn on_call_proceeding(&mut self) -> Vec<CallControlAction> {
        if self.state != CallState::CallInitiated && self.state != CallState::OverlapSending {
            return Vec::new();
        }
        self.cancel_timer();
        self.state = CallState::OutgoingCallProceeding;
        self.start_timer(TimerKind::T310, self.config.t310);
        vec![CallControlAction::Emit(CallControlEvent::Proceeding)]
    }

    fn on_alerting(&mut self) -> Vec<CallControlAction> {
        if self.state != CallState::OutgoingCallProceeding && self.state != CallState::CallInitiated {
            return Vec::new();
        }
        self.cancel_timer();
        self.state = CallState::CallDelivered;
        self.start_timer(TimerKind::T301, self.config.t301);
        vec![CallControlAction::Emit(CallControlEvent::Alerting)]
    }

    fn on_connect(&mut self) -> Vec<CallControlAction> {
        self.cancel_timer();
        self.state = CallState::Active;
        vec![
            CallControlAction::Send(Message::new(self.call_ref, MessageType::ConnectAcknowledge)),
            CallControlAction::Emit(CallControlEvent::Connected),
        ]
    }

    fn on_disconnect(&mut self, msg: &Message) -> Vec<CallControlAction> {
        self.last_cause = msg.cause();
        self.cancel_timer();
        self.state = CallState::ReleaseRequest;
        self.t303_retry = false;
        self.start_timer(TimerKind::T308, self.config.t308);
        vec![CallControlAction::Send(Message::new(self.call_ref, MessageType::Release))]
    }

    fn on_release(&mut self, msg: &Message) -> Vec<CallControlAction> {
        self.last_cause = msg.cause().or(self.last_cause);
        self.cancel_timer();
        self.state = CallState::Null;
        vec![
            CallControlAction::Send(Message::new(self.call_ref, MessageType::ReleaseComplete)),
            CallControlAction::Emit(CallControlEvent::Cleared { cause: self.last_cause.unwrap_or(cause::NORMAL_CLEARING) }),
        ]
    }

    fn on_release_complete(&mut self, msg: &Message) -> Vec<CallControlAction> {
        self.last_cause = msg.cause().or(self.last_cause);
        self.cancel_timer();
        self.state = CallState::Null;
        vec![CallControlAction::Emit(CallControlEvent::Cleared { cause: self.last_cause.unwrap_or(cause::NORMAL_CLEARING) })]
    }

    /// STATUS handling per the "compatible"/"incompatible" tie-break:
    /// accept silently if `compatible`, else clear with cause 101.
    fn on_status(&mut self, msg: &Message) -> Vec<CallControlAction> {
        let reported_cause = msg.cause();
        let compatible = reported_cause.map(|c| c != cause::MESSAGE_INCOMPATIBLE_WITH_CALL_STATE).unwrap_or(true);
        if compatible {
            vec![CallControlAction::Emit(CallControlEvent::StatusAccepted)]
        } else {
            self.clear_locally(cause::MESSAGE_INCOMPATIBLE_WITH_CALL_STATE)
        }
    }

    fn on_status_enquiry(&mut self) -> Vec<CallControlAction> {
        vec![CallControlAction::Send(Message::new(self.call_ref, MessageType::Status).with_ie(Ie::cause(0, 0)))]
    }

    /// Tear the call down locally without waiting on the peer (used by
    /// timer expiries and incompatible-state STATUS).
    fn clear_locally(&mut self, reason: u8) -> Vec<CallControlAction> {
        self.cancel_timer();
        self.last_cause = Some(reason);
        self.state = CallState::Null;
        vec![
            CallControlAction::Send(Message::new(self.call_ref, MessageType::ReleaseComplete).with_ie(Ie::cause(reason, 0))),
            CallControlAction::Emit(CallControlEvent::Cleared { cause: reason }),
        ]
    }

    /// Local-initiated disconnect (e.g. the SIP side sent BYE).
    pub fn disconnect(&mut self, cause: u8) -> Vec<CallControlAction> {
        self.cancel_timer();
        self.last_cause = Some(cause);
        self.state = CallState::DisconnectRequest;
        self.start_timer(TimerKind::T305, self.config.t305);
        vec![CallControlAction::Send(Message::new(self.call_ref, MessageType::Disconnect).with_ie(Ie::cause(cause, 0)))]
    }

    pub fn handle_timer(&mut self, expired: &ExpiredTimer) -> Vec<CallControlAction> {
        match expired.kind {
            TimerKind::T303 => self.clear_locally(cause::RECOVERY_ON_TIMER_EXPIRY),
            TimerKind::T301 => self.clear_locally(cause::RECOVERY_ON_TIMER_EXPIRY),
            TimerKind::T310 => self.clear_locally(cause::RECOVERY_ON_TIMER_EXPIRY),
            TimerKind::T302 => {
                self.state = CallState::CallPresent;
                self.called_number = Some(self.overlap_digits.clone());
                vec![CallControlAction::Emit(CallControlEvent::InboundSetup {
                    calling: self.calling_number.clone(),
                    called: self.called_number.clone(),
                })]
            }
            TimerKind::T305 => {
                self.state = CallState::ReleaseRequest;
                self.start_timer(TimerKind::T308, self.config.t308);
                vec![CallControlAction::Send(
                    Message::new(self.call_ref, MessageType::Release).with_ie(Ie::cause(self.last_cause.unwrap_or(cause::RECOVERY_ON_TIMER_EXPIRY), 0)),
                )]
            }
            TimerKind::T308 => {
                if !self.t303_retry {
                    self.t303_retry = true;
                    self.start_timer(TimerKind::T308, self.config.t308);
                    vec![CallControlAction::Send(Message::new(self.call_ref, MessageType::Release))]
                } else {
                    self.clear_locally(cause::RECOVERY_ON_TIMER_EXPIRY)
                }
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_runtime::timer::impls::HeapTimerBackend;
    use std::sync::Arc;

    fn sm() -> CallControlSm {
        let timers = TimerRegistry::new(Arc::new(HeapTimerBackend::new()));
        CallControlSm::new(CallReference::new(0x1234, false), TaskId::new(1), CallControlConfig::new(), timers)
    }

    #[test]
    fn scenario_1_inbound_setup_surfaces_numbers() {
        let mut s = sm();
        let setup = Message::new(CallReference::new(0x1234, false), MessageType::Setup)
            .with_ie(Ie::bearer_capability_speech())
            .with_ie(Ie::calling_party_number("5551001"))
            .with_ie(Ie::called_party_number("5551002"))
            .with_ie(Ie::sending_complete());

        let actions = s.handle_inbound_setup(&setup);
        assert_eq!(s.state(), CallState::CallPresent);
        assert!(actions.contains(&CallControlAction::Emit(CallControlEvent::InboundSetup {
            calling: Some("5551001".into()),
            called: Some("5551002".into()),
        })));
    }

    #[test]
    fn outbound_call_progresses_to_active() {
        let mut s = sm();
        s.originate("100".into(), "200".into());
        assert_eq!(s.state(), CallState::CallInitiated);

        s.handle_message(&Message::new(s.call_ref(), MessageType::CallProceeding));
        assert_eq!(s.state(), CallState::OutgoingCallProceeding);

        s.handle_message(&Message::new(s.call_ref(), MessageType::Alerting));
        assert_eq!(s.state(), CallState::CallDelivered);

        let actions = s.handle_message(&Message::new(s.call_ref(), MessageType::Connect));
        assert_eq!(s.state(), CallState::Active);
        assert!(actions.contains(&CallControlAction::Emit(CallControlEvent::Connected)));
    }

    #[test]
    fn t303_expiry_clears_with_cause_102() {
        let mut s = sm();
        s.originate("100".into(), "200".into());
        let actions = s.handle_timer(&ExpiredTimer { task: TaskId::new(1), handle: TimerHandle::new(), kind: TimerKind::T303 });
        assert_eq!(s.state(), CallState::Null);
        assert!(actions.contains(&CallControlAction::Emit(CallControlEvent::Cleared { cause: cause::RECOVERY_ON_TIMER_EXPIRY })));
    }

    #[test]
    fn disconnect_then_release_complete_frees_call() {
        let mut s = sm();
        s.originate("100".into(), "200".into());
        s.handle_message(&Message::new(s.call_ref(), MessageType::Connect));
        s.disconnect(cause::NORMAL_CLEARING);
        assert_eq!(s.state(), CallState::DisconnectRequest);

        let rel = Message::new(s.call_ref(), MessageType::Release).with_ie(Ie::cause(cause::NORMAL_CLEARING, 0));
        s.handle_message(&rel);
        assert_eq!(s.state(), CallState::Null);
    }

    #[test]
    fn incompatible_status_clears_with_cause_101() {
        let mut s = sm();
        s.originate("100".into(), "200".into());
        s.handle_message(&Message::new(s.call_ref(), MessageType::CallProceeding));
        let status = Message::new(s.call_ref(), MessageType::Status).with_ie(Ie::cause(cause::MESSAGE_INCOMPATIBLE_WITH_CALL_STATE, 0));
        let actions = s.handle_message(&status);
        assert_eq!(s.state(), CallState::Null);
        assert!(actions.iter().any(|a| matches!(a, CallControlAction::Emit(CallControlEvent::Cleared { cause: 101 }))));
    }

    #[test]
    fn compatible_status_is_accepted_silently() {
        let mut s = sm();
        s.originate("100".into(), "200".into());
        s.handle_message(&Message::new(s.call_ref(), MessageType::CallProceeding));
        let before = s.state();
        let status = Message::new(s.call_ref(), MessageType::Status).with_ie(Ie::cause(0, 0));
        let actions = s.handle_message(&status);
        assert_eq!(s.state(), before);
        assert!(actions.contains(&CallControlAction::Emit(CallControlEvent::StatusAccepted)));
    }

    #[test]
    fn glare_tie_break_prefers_larger_call_reference() {
        use crate::event::{resolve_glare, OriginatingSide};
        let local = CallReference::new(42, false);
        let remote = CallReference::new(7, false);
        assert_eq!(resolve_glare(local, remote), OriginatingSide::Local);
        assert_eq!(resolve_glare(remote, local), OriginatingSide::Local);
    }
}
