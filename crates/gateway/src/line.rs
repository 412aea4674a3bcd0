//! One D-channel endpoint, either a single span (FAS) or an NFAS group of
//! spans presenting one logical endpoint upstream, wrapping multiple
//! B-instances behind a single D-channel endpoint.
//!
//! A `SignalingLine` owns the LAPD/NFAS layer and the [`CallTable`] of
//! every call reference active on it, and turns raw octets in either
//! direction into [`LineAction`]s the supervisor carries out against the
//! transport and the rest of the gateway.

use gateway_core::id::TaskId;
use gateway_runtime::timer::{ExpiredTimer, TimerRegistry};
use lapd::{Address, LapdAction, LapdConfig, LapdEngine, LapdEvent};
use nfas::{NfasAction, NfasConfig, NfasConfigError, NfasEvent, NfasGroup};
use q931::{CallControlAction, CallControlConfig, CallControlEvent, CallTable, Message, MessageType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    SendOctets { span_id: u32, octets: Vec<u8> },
    CallEvent { call_ref: u16, event: CallControlEvent },
    LinkEvent(LapdEvent),
    GroupEvent(NfasEvent),
}

pub enum SignalingLine {
    Fas { span_id: u32, engine: LapdEngine, calls: CallTable },
    Nfas { group: NfasGroup, calls: CallTable },
}

impl SignalingLine {
    pub fn fas(span_id: u32, task: TaskId, lapd_config: LapdConfig, call_config: CallControlConfig, timers: TimerRegistry) -> Self {
        let address = Address { sapi: Address::SAPI_CALL_CONTROL, command_response: false, tei: 0 };
        let engine = LapdEngine::new(task, address, lapd_config, timers.clone());
        let calls = CallTable::new(task, call_config, timers);
        SignalingLine::Fas { span_id, engine, calls }
    }

    pub fn nfas(
        group_id: u32,
        spans: Vec<(u32, LapdEngine)>,
        nfas_config: NfasConfig,
        call_config: CallControlConfig,
        task: TaskId,
        timers: TimerRegistry,
    ) -> Result<Self, NfasConfigError> {
        let group = NfasGroup::new(group_id, spans, nfas_config, task, timers.clone())?;
        let calls = CallTable::new(task, call_config, timers);
        Ok(SignalingLine::Nfas { group, calls })
    }

    pub fn start(&mut self) -> Vec<LineAction> {
        match self {
            SignalingLine::Fas { span_id, engine, .. } => {
                let span_id = *span_id;
                engine.start().into_iter().map(|a| lapd_line_action(span_id, a)).collect()
            }
            SignalingLine::Nfas { group, .. } => group.start().into_iter().filter_map(nfas_line_action).collect(),
        }
    }

    /// Octets arrived on `span_id`'s D-channel.
    pub fn handle_octets(&mut self, span_id: u32, octets: &[u8]) -> Vec<LineAction> {
        let (mut out, call_actions) = match self {
            SignalingLine::Fas { engine, calls, .. } => convert_lapd(span_id, engine.handle_octets(octets), calls),
            SignalingLine::Nfas { group, calls } => convert_nfas(group.handle_span_frame(span_id, octets), calls),
        };
        for (call_ref, action) in call_actions {
            self.push_call_action(call_ref, action, &mut out);
        }
        out
    }

    pub fn handle_timer(&mut self, span_id: u32, expired: ExpiredTimer) -> Vec<LineAction> {
        let (mut out, call_actions) = match self {
            SignalingLine::Fas { engine, calls, .. } => convert_lapd(span_id, engine.handle_timer(expired), calls),
            SignalingLine::Nfas { group, calls } => convert_nfas(group.handle_span_timer(span_id, expired), calls),
        };
        for (call_ref, action) in call_actions {
            self.push_call_action(call_ref, action, &mut out);
        }
        out
    }

    pub fn handle_group_timer(&mut self, expired: ExpiredTimer) -> Vec<LineAction> {
        let (mut out, call_actions) = match self {
            SignalingLine::Fas { .. } => return Vec::new(),
            SignalingLine::Nfas { group, calls } => convert_nfas(group.handle_group_timer(expired), calls),
        };
        for (call_ref, action) in call_actions {
            self.push_call_action(call_ref, action, &mut out);
        }
        out
    }

    /// Call-control timer firing (T301/T303/T305/T308/T310/T302) for one
    /// call reference; routed by the supervisor's timer dispatch, not by
    /// this type, since it doesn't know which call owns a given handle.
    pub fn handle_call_timer(&mut self, call_ref: u16, expired: &ExpiredTimer) -> Vec<LineAction> {
        let calls = match self {
            SignalingLine::Fas { calls, .. } => calls,
            SignalingLine::Nfas { calls, .. } => calls,
        };
        let Some(sm) = calls.get_mut(call_ref) else { return Vec::new() };
        let actions = sm.handle_timer(expired);
        let mut out = Vec::new();
        for action in actions {
            self.push_call_action(call_ref, action, &mut out);
        }
        out
    }

    /// Originate a local call: allocate a call reference and send SETUP.
    pub fn originate(&mut self, calling: String, called: String) -> (u16, Vec<LineAction>) {
        let calls = match self {
            SignalingLine::Fas { calls, .. } => calls,
            SignalingLine::Nfas { calls, .. } => calls,
        };
        let sm = calls.originate(1);
        let call_ref = sm.call_ref().value;
        let actions = sm.originate(calling, called);
        let mut out = Vec::new();
        for action in actions {
            self.push_call_action(call_ref, action, &mut out);
        }
        (call_ref, out)
    }

    /// Accept an inbound call whose translation reached the SIP side
    /// (180/183/200): progress its call-control SM and encode the reply.
    pub fn drive_call<F>(&mut self, call_ref: u16, f: F) -> Vec<LineAction>
    where
        F: FnOnce(&mut q931::CallControlSm) -> Vec<CallControlAction>,
    {
        let calls = match self {
            SignalingLine::Fas { calls, .. } => calls,
            SignalingLine::Nfas { calls, .. } => calls,
        };
        let Some(sm) = calls.get_mut(call_ref) else { return Vec::new() };
        let actions = f(sm);
        let mut out = Vec::new();
        for action in actions {
            self.push_call_action(call_ref, action, &mut out);
        }
        out
    }

    pub fn remove_call(&mut self, call_ref: u16) {
        match self {
            SignalingLine::Fas { calls, .. } => calls.remove(call_ref),
            SignalingLine::Nfas { calls, .. } => calls.remove(call_ref),
        }
    }

    /// Encode `payload` (a Q.931 message) the way this line's link layer
    /// requires and hand the result to the transport. A locally
    /// originated message is sequenced and retransmission-tracked exactly
    /// like anything reconstructed from an inbound frame — it is never
    /// written to the wire as a bare, unframed I-frame payload: the
    /// retransmit queue holds every frame in `[V(A), V(S))`, which only
    /// holds if `send_data`/`send` is the one path that ever emits an
    /// I-frame.
    fn transmit(&mut self, payload: Vec<u8>) -> Vec<LineAction> {
        match self {
            SignalingLine::Fas { span_id, engine, .. } => match engine.send_data(payload) {
                Ok(actions) => actions.into_iter().map(|a| lapd_line_action(*span_id, a)).collect(),
                Err(_) => Vec::new(), // link down or window full: dropped, same posture as a malformed inbound frame
            },
            SignalingLine::Nfas { group, .. } => group.send(payload).into_iter().filter_map(nfas_line_action).collect(),
        }
    }

    fn push_call_action(&mut self, call_ref: u16, action: CallControlAction, out: &mut Vec<LineAction>) {
        match action {
            CallControlAction::Send(msg) => out.extend(self.transmit(msg.encode())),
            CallControlAction::Emit(event) => out.push(LineAction::CallEvent { call_ref, event }),
        }
    }
}

fn lapd_line_action(span_id: u32, action: LapdAction) -> LineAction {
    match action {
        LapdAction::SendOctets(octets) => LineAction::SendOctets { span_id, octets },
        LapdAction::Emit(event) => LineAction::LinkEvent(event),
    }
}

/// Used only at group startup, before any call table exists to hand a
/// `DataIndication` to; `start()` never produces one (no peer data has
/// arrived yet), so that case is dropped rather than wired up.
fn nfas_line_action(action: NfasAction) -> Option<LineAction> {
    match action {
        NfasAction::SendOnSpan { span_id, octets } => Some(LineAction::SendOctets { span_id, octets }),
        NfasAction::DataIndication { .. } => None,
        NfasAction::Emit(event) => Some(LineAction::GroupEvent(event)),
    }
}

/// Split a batch of LAPD actions into wire-ready [`LineAction`]s and any
/// call-control actions a `DataIndication` produced, without yet
/// encoding the latter — encoding a `Send` has to go back through the
/// owning `SignalingLine`'s link layer, which a free function taking
/// only `&mut CallTable` has no handle on.
fn convert_lapd(span_id: u32, actions: Vec<LapdAction>, calls: &mut CallTable) -> (Vec<LineAction>, Vec<(u16, CallControlAction)>) {
    let mut out = Vec::new();
    let mut call_actions = Vec::new();
    for action in actions {
        match action {
            LapdAction::SendOctets(octets) => out.push(LineAction::SendOctets { span_id, octets }),
            LapdAction::Emit(LapdEvent::DataIndication(payload)) => call_actions.extend(dispatch_q931(&payload, calls)),
            LapdAction::Emit(event) => out.push(LineAction::LinkEvent(event)),
        }
    }
    (out, call_actions)
}

fn convert_nfas(actions: Vec<NfasAction>, calls: &mut CallTable) -> (Vec<LineAction>, Vec<(u16, CallControlAction)>) {
    let mut out = Vec::new();
    let mut call_actions = Vec::new();
    for action in actions {
        match action {
            NfasAction::SendOnSpan { span_id, octets } => out.push(LineAction::SendOctets { span_id, octets }),
            NfasAction::DataIndication { payload, .. } => call_actions.extend(dispatch_q931(&payload, calls)),
            NfasAction::Emit(event) => out.push(LineAction::GroupEvent(event)),
        }
    }
    (out, call_actions)
}

/// Decode one SAPI-0 I-frame payload as a Q.931 message and drive the
/// owning (or newly created) call-control SM.
fn dispatch_q931(payload: &[u8], calls: &mut CallTable) -> Vec<(u16, CallControlAction)> {
    let Ok(msg) = Message::decode(payload) else {
        return Vec::new(); // malformed message: dropped, never torn the call down over it
    };
    let call_ref = msg.call_ref.value;

    let actions = if msg.message_type == MessageType::Setup {
        match calls.handle_inbound_setup(&msg) {
            Ok(sm) => sm.handle_inbound_setup(&msg),
            Err(rejection) => vec![CallControlAction::Send(rejection)],
        }
    } else if let Some(sm) = calls.get_mut(call_ref) {
        sm.handle_message(&msg)
    } else {
        Vec::new()
    };

    actions.into_iter().map(|a| (call_ref, a)).collect()
}
