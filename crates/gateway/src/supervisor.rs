//! The gateway supervisor: owns every collaborator and wires them
//! against a [`TdmTransport`]/[`SipTransport`] pair, translating between
//! them through [`xlat`] and correlating one call's four identities
//! through [`SessionRegistry`].
//!
//! This is the one place in the workspace that performs I/O; every
//! collaborator below it (`lapd`, `q931`, `isup`, `nfas`, `xlat`,
//! `session`, `rtp`) is a pure state machine. The supervisor's job is to
//! receive octets, hand them to the right state machine, and carry out
//! whatever actions come back.

use std::collections::HashMap;
use std::sync::Arc;

use gateway_core::id::TaskId;
use gateway_core::{loginfo, logwarn};
use gateway_runtime::timer::impls::HeapTimerBackend;
use gateway_runtime::timer::{ExpiredTimer, TimerKind, TimerRegistry};
use gateway_runtime::TaskSupervisor;
use isup::{IsupAction, IsupEvent, IsupHandler, IsupMessage};
use lapd::LapdEngine;
use q931::CallControlAction;
use nfas::NfasConfigError;
use rtp::PortPool;
use session::{CallEventRecord, SessionKey, SlotKind};
use xlat::{isup_event_to_sip, isup_iam_to_invite, q931_event_to_sip, sip_status_to_cause};
use xlat::{RuleSet, SipMessage, TranslationContext, Variant};

use crate::config::GatewayConfig;
use crate::line::{LineAction, SignalingLine};
use crate::transport::{SipTransport, TdmTransport};

/// Span id this gateway reserves for the SIGTRAN/ISUP feed, distinct
/// from any D-channel span id so both paths can share one
/// [`TdmTransport`] without ambiguity.
pub const ISUP_TRANSPORT_ID: u32 = u32::MAX;

struct RuleSetStore(xlat::tables::RuleSetStore);

impl RuleSetStore {
    fn new(variant: Variant) -> Self {
        Self(xlat::tables::RuleSetStore::new(variant))
    }

    fn load(&self) -> Arc<RuleSet> {
        self.0.load()
    }
}

/// Ties a call-control or ISUP identity back to the session it belongs
/// to, so an inbound `Cleared`/`Released` event can find and release
/// every slot without the caller threading the session id through.
#[derive(Clone, Copy)]
enum CallKind {
    Q931 { line_id: u32, call_ref: u16 },
    Isup { cic: u16 },
}

pub struct Gateway {
    config: GatewayConfig,
    task: TaskSupervisor,
    timers: TimerRegistry,
    next_task_id: u32,
    lines: HashMap<u32, SignalingLine>,
    isup: Option<IsupHandler>,
    registry: session::SessionRegistry,
    ports: PortPool,
    rules: RuleSetStore,
    tdm: Box<dyn TdmTransport>,
    sip: Box<dyn SipTransport>,
    contexts: HashMap<session::SessionId, TranslationContext>,
    calls_by_session: HashMap<session::SessionId, CallKind>,
    events: Vec<CallEventRecord>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, tdm: Box<dyn TdmTransport>, sip: Box<dyn SipTransport>) -> Self {
        let timers = TimerRegistry::new(Arc::new(HeapTimerBackend::new()));
        let ports = PortPool::new(&config.rtp).expect("RTP port range must validate");
        let rules = RuleSetStore::new(config.variant);
        Self {
            task: TaskSupervisor::new(config.runtime.task_stack_size),
            timers,
            next_task_id: 0,
            lines: HashMap::new(),
            isup: None,
            registry: session::SessionRegistry::new(),
            ports,
            rules,
            tdm,
            sip,
            contexts: HashMap::new(),
            calls_by_session: HashMap::new(),
            events: Vec::new(),
            config,
        }
    }

    fn reserve_task(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }

    /// `CallEventRecord`s emitted by sessions that have fully torn down,
    /// for an external subsystem to persist. Draining is the caller's
    /// responsibility — the gateway never discards one.
    pub fn drain_call_events(&mut self) -> Vec<CallEventRecord> {
        std::mem::take(&mut self.events)
    }

    pub fn session_registry(&self) -> &session::SessionRegistry {
        &self.registry
    }

    // ── Topology ────────────────────────────────────────────────────

    /// Add a single-span (FAS) D-channel line, identified by `line_id`.
    pub fn add_fas_line(&mut self, line_id: u32, span_id: u32) {
        let task = self.reserve_task();
        let mut line = SignalingLine::fas(span_id, task, self.config.lapd.clone(), self.config.call_control.clone(), self.timers.clone());
        let startup = line.start();
        self.lines.insert(line_id, line);
        self.carry_out(line_id, startup);
    }

    /// Add an NFAS group line over `spans` (ordered `[primary, backups...]`).
    pub fn add_nfas_line(&mut self, line_id: u32, spans: &[u32]) -> Result<(), NfasConfigError> {
        let task = self.reserve_task();
        let engines = spans
            .iter()
            .map(|&span_id| (span_id, LapdEngine::new(task, lapd::Address { sapi: lapd::Address::SAPI_CALL_CONTROL, command_response: false, tei: 0 }, self.config.lapd.clone(), self.timers.clone())))
            .collect();
        let mut line = SignalingLine::nfas(line_id, engines, self.config.nfas.clone(), self.config.call_control.clone(), task, self.timers.clone())?;
        let startup = line.start();
        self.lines.insert(line_id, line);
        self.carry_out(line_id, startup);
        Ok(())
    }

    /// Enable the ISUP/SIGTRAN trunk side, drawing CICs from the
    /// gateway's configured range.
    pub fn enable_isup(&mut self) {
        self.isup = Some(IsupHandler::new(self.config.isup));
    }

    // ── TDM ingress/egress ───────────────────────────────────────────

    pub fn handle_tdm_frame(&mut self, line_id: u32, span_id: u32, octets: &[u8]) {
        let Some(line) = self.lines.get_mut(&line_id) else {
            logwarn!("tdm frame for unknown line {line_id}");
            return;
        };
        let actions = line.handle_octets(span_id, octets);
        self.carry_out(line_id, actions);
    }

    pub fn handle_tdm_timer(&mut self, line_id: u32, span_id: u32, expired: ExpiredTimer) {
        let Some(line) = self.lines.get_mut(&line_id) else { return };
        let actions = match expired.kind {
            TimerKind::T200 | TimerKind::T203 => line.handle_timer(span_id, expired),
            TimerKind::NfasHeartbeat | TimerKind::SwitchoverWatchdog => line.handle_group_timer(expired),
            _ => Vec::new(),
        };
        self.carry_out(line_id, actions);
    }

    /// A call-control timer (T301/T303/T305/T308/T310/T302) fired for
    /// `call_ref` on `line_id`.
    pub fn handle_call_timer(&mut self, line_id: u32, call_ref: u16, expired: &ExpiredTimer) {
        let Some(line) = self.lines.get_mut(&line_id) else { return };
        let actions = line.handle_call_timer(call_ref, expired);
        self.carry_out(line_id, actions);
    }

    fn carry_out(&mut self, line_id: u32, actions: Vec<LineAction>) {
        for action in actions {
            match action {
                LineAction::SendOctets { span_id, octets } => {
                    if let Err(e) = self.tdm.send(span_id, &octets) {
                        let gerr: gerror::GError = e.into();
                        logwarn!("tdm send failed on span {span_id}: {gerr}");
                    }
                }
                LineAction::CallEvent { call_ref, event } => self.handle_q931_event(line_id, call_ref, event),
                LineAction::LinkEvent(event) => loginfo!("line {line_id} link event: {event:?}"),
                LineAction::GroupEvent(event) => loginfo!("line {line_id} group event: {event:?}"),
            }
        }
    }

    fn handle_q931_event(&mut self, line_id: u32, call_ref: u16, event: q931::CallControlEvent) {
        use q931::CallControlEvent as E;
        match event {
            E::InboundSetup { calling, called } => {
                let Ok(pair) = self.ports.allocate() else {
                    logwarn!("RTP port pool exhausted, rejecting call-ref {call_ref}");
                    let reject = self.lines.get_mut(&line_id).map(|l| {
                        l.drive_call(call_ref, |sm| sm.disconnect(q931::cause::NO_CIRCUIT_AVAILABLE))
                    });
                    if let Some(actions) = reject {
                        self.carry_out(line_id, actions);
                    }
                    return;
                };
                let sip_call_id = format!("q931-{line_id}-{call_ref:04x}");
                let ctx = TranslationContext::new(self.config.variant, sip_call_id.clone(), self.config.local_rtp_ip.clone())
                    .with_local_port(pair.rtp);

                let key = SessionKey { call_ref: Some(call_ref), cic: None, sip_call_id: Some(sip_call_id), rtp_port: Some(pair.rtp) };
                let Ok(session_id) = self.registry.insert(key, Some(pair)) else {
                    logwarn!("session key collision for call-ref {call_ref}");
                    self.ports.release(pair.rtp);
                    return;
                };
                self.calls_by_session.insert(session_id, CallKind::Q931 { line_id, call_ref });

                let rules = self.rules.load();
                if let Some(msg) = q931_event_to_sip(&E::InboundSetup { calling, called }, &ctx, &rules) {
                    self.sip.send(msg);
                }
                self.contexts.insert(session_id, ctx);
            }
            other => {
                let Some(session_id) = self.registry.lookup_by_call_ref(call_ref).map(|r| r.id) else { return };
                self.forward_q931_translation(session_id, &other);
                if let E::Cleared { cause } = other {
                    self.teardown(session_id, cause, SlotKind::CallRef);
                    self.lines.get_mut(&line_id).map(|l| l.remove_call(call_ref));
                }
                if matches!(other, E::Connected) {
                    let _ = self.registry.mark_answered(session_id);
                }
            }
        }
    }

    fn forward_q931_translation(&mut self, session_id: session::SessionId, event: &q931::CallControlEvent) {
        let Some(ctx) = self.contexts.get(&session_id) else { return };
        let rules = self.rules.load();
        if let Some(msg) = q931_event_to_sip(event, ctx, &rules) {
            self.sip.send(msg);
        }
    }

    // ── SIGTRAN/ISUP ingress/egress ──────────────────────────────────

    pub fn handle_sigtran_frame(&mut self, octets: &[u8], remote_point_code: u32) {
        let Ok(msg) = IsupMessage::decode(octets) else { return };
        let Some(isup) = self.isup.as_mut() else {
            logwarn!("ISUP frame received but ISUP is not enabled");
            return;
        };
        let actions = isup.handle_inbound(&msg, remote_point_code);
        self.handle_isup_actions(actions, Some(&msg));
    }

    fn handle_isup_actions(&mut self, actions: Vec<IsupAction>, original: Option<&IsupMessage>) {
        for action in actions {
            match action {
                IsupAction::Send(out) => {
                    if let Err(e) = self.tdm.send(ISUP_TRANSPORT_ID, &out.encode()) {
                        logwarn!("sigtran send failed: {e}");
                    }
                }
                IsupAction::Emit(event) => self.handle_isup_event(event, original),
            }
        }
    }

    fn handle_isup_event(&mut self, event: IsupEvent, original: Option<&IsupMessage>) {
        match event {
            IsupEvent::InboundSetup { cic, .. } => {
                let Ok(pair) = self.ports.allocate() else {
                    logwarn!("RTP port pool exhausted, releasing CIC {cic}");
                    if let Some(isup) = self.isup.as_mut() {
                        let actions = isup.release(cic, isup::cause::NO_CIRCUIT_AVAILABLE);
                        self.handle_isup_actions(actions, None);
                    }
                    return;
                };
                let sip_call_id = format!("isup-{cic:04x}");
                let ctx = TranslationContext::new(self.config.variant, sip_call_id.clone(), self.config.local_rtp_ip.clone())
                    .with_local_port(pair.rtp);

                let key = SessionKey { call_ref: None, cic: Some(cic), sip_call_id: Some(sip_call_id), rtp_port: Some(pair.rtp) };
                let Ok(session_id) = self.registry.insert(key, Some(pair)) else {
                    logwarn!("session key collision for CIC {cic}");
                    self.ports.release(pair.rtp);
                    return;
                };
                self.calls_by_session.insert(session_id, CallKind::Isup { cic });

                if let Some(IsupMessage::Iam { .. }) = original {
                    if let Some(invite) = isup_iam_to_invite(original.unwrap(), &ctx) {
                        self.sip.send(invite);
                    }
                }
                self.contexts.insert(session_id, ctx);
            }
            IsupEvent::Released { cic, cause, direction, answered } => {
                if let Some(session_id) = self.registry.lookup_by_cic(cic).map(|r| r.id) {
                    let rules = self.rules.load();
                    let released = IsupEvent::Released { cic, cause, direction, answered };
                    if let Some(msg) = isup_event_to_sip(&released, &rules) {
                        self.sip.send(msg);
                    }
                    self.teardown(session_id, cause, SlotKind::Cic);
                }
            }
            IsupEvent::Proceeding { cic } | IsupEvent::Answered { cic } => {
                let Some(session_id) = self.registry.lookup_by_cic(cic).map(|r| r.id) else { return };
                let rules = self.rules.load();
                if let Some(msg) = isup_event_to_sip(&event, &rules) {
                    self.sip.send(msg);
                }
                if matches!(event, IsupEvent::Answered { .. }) {
                    let _ = self.registry.mark_answered(session_id);
                }
            }
            IsupEvent::Idle { .. } | IsupEvent::UnknownMessage { .. } | IsupEvent::Glare { .. } => {}
        }
    }

    // ── SIP ingress ───────────────────────────────────────────────────

    /// The inbound-call B-channel/CIC-side selection this abstracted
    /// gateway uses when a SIP provisional response drives an inbound
    /// Q.931 call forward. Real B-channel selection is a TDM-hardware
    /// concern out of this core's scope; the session's RTP port already
    /// stands in for the media path here.
    const DEFAULT_BCHANNEL: u8 = 1;

    /// A message arrived from the SIP collaborator: provisional and
    /// success responses drive an inbound call forward; `BYE` or a final
    /// failure response tears it down via the outbound cause mapping.
    pub fn handle_sip_message(&mut self, msg: &SipMessage) {
        let Some(call_id) = sip_call_id_of(msg) else { return };
        let Some(record) = self.registry.lookup_by_sip_call_id(&call_id) else {
            logwarn!("SIP message for unknown Call-ID {call_id}");
            return;
        };
        let session_id = record.id;
        let Some(kind) = self.calls_by_session.get(&session_id).copied() else { return };

        let is_bye = matches!(msg, SipMessage::Request { method, .. } if method == "BYE");
        if is_bye {
            self.clear_call(kind, q931::cause::NORMAL_CLEARING);
            return;
        }

        let SipMessage::Response { status, .. } = msg else { return };
        match *status {
            100 => {
                if let CallKind::Q931 { line_id, call_ref } = kind {
                    self.drive_q931(line_id, call_ref, |sm| sm.accept_incoming(Self::DEFAULT_BCHANNEL));
                }
            }
            180 => {
                if let CallKind::Q931 { line_id, call_ref } = kind {
                    self.drive_q931(line_id, call_ref, |sm| sm.send_alerting());
                }
            }
            183 => {
                if let CallKind::Isup { cic } = kind {
                    if let Some(isup) = self.isup.as_mut() {
                        let actions = isup.progress(cic);
                        self.handle_isup_actions(actions, None);
                    }
                }
            }
            200 => match kind {
                CallKind::Q931 { line_id, call_ref } => self.drive_q931(line_id, call_ref, |sm| sm.send_connect()),
                CallKind::Isup { cic } => {
                    if let Some(isup) = self.isup.as_mut() {
                        let actions = isup.answer(cic);
                        self.handle_isup_actions(actions, None);
                    }
                }
            },
            status if status >= 300 => {
                let cause = sip_status_to_cause(status, &self.rules.load());
                self.clear_call(kind, cause);
            }
            _ => {}
        }
    }

    fn drive_q931<F>(&mut self, line_id: u32, call_ref: u16, f: F)
    where
        F: FnOnce(&mut q931::CallControlSm) -> Vec<CallControlAction>,
    {
        if let Some(actions) = self.lines.get_mut(&line_id).map(|l| l.drive_call(call_ref, f)) {
            self.carry_out(line_id, actions);
        }
    }

    fn clear_call(&mut self, kind: CallKind, cause: u8) {
        match kind {
            CallKind::Q931 { line_id, call_ref } => self.drive_q931(line_id, call_ref, |sm| sm.disconnect(cause)),
            CallKind::Isup { cic } => {
                if let Some(isup) = self.isup.as_mut() {
                    let actions = isup.release(cic, cause);
                    self.handle_isup_actions(actions, None);
                }
            }
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────

    fn teardown(&mut self, session_id: session::SessionId, cause: u8, first_slot: SlotKind) {
        let _ = self.registry.set_cause(session_id, cause);
        let Some(record) = self.registry.lookup(session_id) else { return };
        self.calls_by_session.remove(&session_id);
        self.contexts.remove(&session_id);

        let mut record_out = None;
        if let Ok(r) = self.registry.release(session_id, first_slot) {
            record_out = record_out.or(r);
        }
        if record.sip_call_id.is_some() && first_slot != SlotKind::SipCallId {
            if let Ok(r) = self.registry.release(session_id, SlotKind::SipCallId) {
                record_out = record_out.or(r);
            }
        }
        if let Some(pair) = record.rtp_pair {
            if first_slot != SlotKind::RtpPort {
                if let Ok(r) = self.registry.release(session_id, SlotKind::RtpPort) {
                    record_out = record_out.or(r);
                }
            }
            self.ports.release(pair.rtp);
        }
        if let Some(event) = record_out {
            self.events.push(event);
        }
    }
}

fn sip_call_id_of(msg: &SipMessage) -> Option<String> {
    match msg {
        SipMessage::Request { headers, .. } | SipMessage::Response { headers, .. } => headers.get("Call-ID").map(str::to_string),
    }
}
