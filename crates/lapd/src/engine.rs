//! Per-D-channel data-link state machine (Q.921 §5, abbreviated subset).

use std::collections::VecDeque;

use gateway_core::id::TaskId;
use gateway_runtime::timer::{ExpiredTimer, TimerHandle, TimerKind, TimerRegistry};

use crate::config::LapdConfig;
use crate::event::{LapdAction, LapdErrorKind, LapdEvent, SendError};
use crate::frame::{Address, Control, Frame, SupervisoryKind, UnnumberedKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    AwaitingEstab,
    Established,
    Releasing,
}

/// `(V(S) - V(A)) mod 128`, treated as a window distance in `[0, 127]`.
fn mod128_sub(a: u8, b: u8) -> u8 {
    (((a as i16) - (b as i16)).rem_euclid(128)) as u8
}

fn mod128_incr(a: u8) -> u8 {
    (a + 1) % 128
}

pub struct LapdEngine {
    state: LinkState,
    vs: u8,
    vr: u8,
    va: u8,
    retry_count: u32,
    peer_busy: bool,
    /// Unacknowledged I-frames, in send order; `front().0 == V(A)` whenever
    /// non-empty.
    retransmit_queue: VecDeque<(u8, Vec<u8>)>,
    t200: Option<TimerHandle>,
    t203: Option<TimerHandle>,
    local_address: Address,
    config: LapdConfig,
    task: TaskId,
    timers: TimerRegistry,
}

impl LapdEngine {
    pub fn new(task: TaskId, local_address: Address, config: LapdConfig, timers: TimerRegistry) -> Self {
        Self {
            state: LinkState::Down,
            vs: 0,
            vr: 0,
            va: 0,
            retry_count: 0,
            peer_busy: false,
            retransmit_queue: VecDeque::new(),
            t200: None,
            t203: None,
            local_address,
            config,
            task,
            timers,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn vs(&self) -> u8 {
        self.vs
    }

    pub fn vr(&self) -> u8 {
        self.vr
    }

    pub fn va(&self) -> u8 {
        self.va
    }

    /// Window distance currently in flight: `V(S) - V(A) (mod 128)`.
    pub fn in_flight(&self) -> u8 {
        mod128_sub(self.vs, self.va)
    }

    fn start_t200(&mut self) {
        if let Some(h) = self.t200.take() {
            self.timers.cancel(h);
        }
        self.t200 = Some(self.timers.schedule(self.task, TimerKind::T200, self.config.t200));
    }

    fn cancel_t200(&mut self) {
        if let Some(h) = self.t200.take() {
            self.timers.cancel(h);
        }
    }

    fn start_t203(&mut self) {
        if let Some(h) = self.t203.take() {
            self.timers.cancel(h);
        }
        self.t203 = Some(self.timers.schedule(self.task, TimerKind::T203, self.config.t203));
    }

    fn cancel_t203(&mut self) {
        if let Some(h) = self.t203.take() {
            self.timers.cancel(h);
        }
    }

    fn u_frame(&self, kind: UnnumberedKind, poll_final: bool) -> LapdAction {
        let frame = Frame {
            address: self.local_address,
            control: Control::U { kind, poll_final },
            information: Vec::new(),
        };
        LapdAction::SendOctets(frame.encode())
    }

    fn s_frame(&self, kind: SupervisoryKind, poll_final: bool) -> LapdAction {
        let frame = Frame {
            address: self.local_address,
            control: Control::S { kind, nr: self.vr, poll_final },
            information: Vec::new(),
        };
        LapdAction::SendOctets(frame.encode())
    }

    fn i_frame_for(&self, ns: u8, payload: &[u8], poll: bool) -> LapdAction {
        let frame = Frame {
            address: self.local_address,
            control: Control::I { ns, nr: self.vr, poll },
            information: payload.to_vec(),
        };
        LapdAction::SendOctets(frame.encode())
    }

    /// From `DOWN`: send SABME(P=1), start T200, move to `AWAITING_ESTAB`.
    pub fn start(&mut self) -> Vec<LapdAction> {
        self.retry_count = 0;
        self.state = LinkState::AwaitingEstab;
        self.start_t200();
        vec![self.u_frame(UnnumberedKind::Sabme, true)]
    }

    /// Queue `payload` for transmission as an I-frame, subject to the
    /// sender's acknowledgement window.
    pub fn send_data(&mut self, payload: Vec<u8>) -> Result<Vec<LapdAction>, SendError> {
        if self.state != LinkState::Established {
            return Err(SendError::LinkNotUp);
        }
        if self.peer_busy {
            return Err(SendError::PeerBusy);
        }
        if self.in_flight() >= self.config.window_k {
            return Err(SendError::WindowFull);
        }

        let ns = self.vs;
        let was_empty = self.retransmit_queue.is_empty();
        self.retransmit_queue.push_back((ns, payload.clone()));
        let action = self.i_frame_for(ns, &payload, false);
        self.vs = mod128_incr(self.vs);

        if was_empty {
            self.start_t200();
        }

        Ok(vec![action])
    }

    /// Decode and process one inbound frame.
    pub fn handle_octets(&mut self, octets: &[u8]) -> Vec<LapdAction> {
        match Frame::decode(octets) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => vec![LapdAction::Emit(LapdEvent::FrameDropped(e))],
        }
    }

    fn handle_frame(&mut self, frame: Frame) -> Vec<LapdAction> {
        match frame.control {
            Control::U { kind, poll_final } => self.handle_u(kind, poll_final),
            Control::S { kind, nr, poll_final } => self.handle_s(kind, nr, poll_final),
            Control::I { ns, nr, poll } => self.handle_i(ns, nr, poll, frame.information),
        }
    }

    fn handle_u(&mut self, kind: UnnumberedKind, poll_final: bool) -> Vec<LapdAction> {
        match (self.state, kind) {
            (LinkState::AwaitingEstab, UnnumberedKind::Ua) if poll_final => {
                self.cancel_t200();
                self.vs = 0;
                self.vr = 0;
                self.va = 0;
                self.retransmit_queue.clear();
                self.state = LinkState::Established;
                self.start_t203();
                vec![LapdAction::Emit(LapdEvent::Established)]
            }
            (LinkState::AwaitingEstab, UnnumberedKind::Dm) => self.retry_or_fail_establishment(),
            (LinkState::Established, UnnumberedKind::Sabme) => {
                self.vs = 0;
                self.vr = 0;
                self.va = 0;
                self.retransmit_queue.clear();
                self.retry_count = 0;
                vec![self.u_frame(UnnumberedKind::Ua, poll_final)]
            }
            (LinkState::Established, UnnumberedKind::Disc) => {
                let ua = self.u_frame(UnnumberedKind::Ua, poll_final);
                self.cancel_t200();
                self.cancel_t203();
                self.state = LinkState::Down;
                vec![ua, LapdAction::Emit(LapdEvent::Released)]
            }
            (LinkState::Established, UnnumberedKind::Frmr) => {
                self.cancel_t200();
                self.cancel_t203();
                self.state = LinkState::Down;
                vec![LapdAction::Emit(LapdEvent::Error(LapdErrorKind::PeerRejected))]
            }
            _ => Vec::new(),
        }
    }

    fn retry_or_fail_establishment(&mut self) -> Vec<LapdAction> {
        if self.retry_count < self.config.n200 {
            self.retry_count += 1;
            self.start_t200();
            vec![self.u_frame(UnnumberedKind::Sabme, true)]
        } else {
            self.state = LinkState::Down;
            vec![LapdAction::Emit(LapdEvent::Error(LapdErrorKind::EstablishmentFailed))]
        }
    }

    fn handle_s(&mut self, kind: SupervisoryKind, nr: u8, _poll_final: bool) -> Vec<LapdAction> {
        if self.state != LinkState::Established {
            return Vec::new();
        }

        self.peer_busy = matches!(kind, SupervisoryKind::Rnr);
        self.advance_va(nr);

        if matches!(kind, SupervisoryKind::Rej) {
            return self.retransmit_from(nr);
        }

        if self.retransmit_queue.is_empty() {
            self.cancel_t200();
        }
        Vec::new()
    }

    /// Drain every queue entry acknowledged by `nr`, advancing `V(A)`.
    fn advance_va(&mut self, nr: u8) {
        while let Some((seq, _)) = self.retransmit_queue.front() {
            if *seq == nr {
                break;
            }
            self.retransmit_queue.pop_front();
        }
        self.va = nr;
    }

    fn retransmit_from(&mut self, nr: u8) -> Vec<LapdAction> {
        let _ = nr;
        self.start_t200();
        self.retransmit_queue
            .iter()
            .map(|(seq, payload)| self.i_frame_for(*seq, payload, false))
            .collect()
    }

    fn handle_i(&mut self, ns: u8, nr: u8, poll: bool, information: Vec<u8>) -> Vec<LapdAction> {
        if self.state != LinkState::Established {
            return Vec::new();
        }

        let mut actions = Vec::new();

        self.advance_va(nr);
        if self.retransmit_queue.is_empty() {
            self.cancel_t200();
        }

        if ns == self.vr {
            self.vr = mod128_incr(self.vr);
            actions.push(LapdAction::Emit(LapdEvent::DataIndication(information)));
            actions.push(self.s_frame(SupervisoryKind::Rr, poll));
        } else {
            actions.push(self.s_frame(SupervisoryKind::Rej, poll));
        }

        actions
    }

    /// Handle a timer firing for this engine (`T200` or `T203`).
    pub fn handle_timer(&mut self, expired: ExpiredTimer) -> Vec<LapdAction> {
        match expired.kind {
            TimerKind::T200 => self.handle_t200_expiry(),
            TimerKind::T203 => self.handle_t203_expiry(),
            _ => Vec::new(),
        }
    }

    fn handle_t200_expiry(&mut self) -> Vec<LapdAction> {
        match self.state {
            LinkState::AwaitingEstab => self.retry_or_fail_establishment(),
            LinkState::Established => {
                if self.retransmit_queue.is_empty() {
                    return Vec::new();
                }
                if self.retry_count < self.config.n200 {
                    self.retry_count += 1;
                    self.start_t200();
                    let (seq, payload) = self.retransmit_queue.front().cloned().unwrap();
                    vec![self.i_frame_for(seq, &payload, false)]
                } else {
                    self.state = LinkState::Down;
                    self.cancel_t203();
                    vec![LapdAction::Emit(LapdEvent::Error(LapdErrorKind::LinkLost))]
                }
            }
            _ => Vec::new(),
        }
    }

    fn handle_t203_expiry(&mut self) -> Vec<LapdAction> {
        if self.state != LinkState::Established {
            return Vec::new();
        }
        self.start_t203();
        vec![self.s_frame(SupervisoryKind::Rr, true)]
    }

    /// On-demand RR(P=1) poll, independent of the T203 idle timer. Used by
    /// the NFAS manager as its preferred link-health heartbeat, favored
    /// over a Q.931 STATUS ENQUIRY poll since it operates purely at the
    /// link layer. Returns `None` if the link isn't `Established` — the
    /// caller counts that as a dispatch failure.
    pub fn send_poll(&mut self) -> Option<LapdAction> {
        if self.state != LinkState::Established {
            return None;
        }
        self.start_t203();
        Some(self.s_frame(SupervisoryKind::Rr, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_runtime::timer::impls::HeapTimerBackend;
    use std::sync::Arc;

    fn engine() -> LapdEngine {
        let timers = TimerRegistry::new(Arc::new(HeapTimerBackend::new()));
        let address = Address { sapi: 0, command_response: true, tei: 0 };
        LapdEngine::new(TaskId::new(1), address, LapdConfig::new(), timers)
    }

    fn ua_frame(engine: &LapdEngine) -> Vec<u8> {
        Frame {
            address: Address { sapi: engine.local_address.sapi, command_response: false, tei: engine.local_address.tei },
            control: Control::U { kind: UnnumberedKind::Ua, poll_final: true },
            information: vec![],
        }
        .encode()
    }

    #[test]
    fn start_sends_sabme_and_arms_t200() {
        let mut e = engine();
        let actions = e.start();
        assert_eq!(e.state(), LinkState::AwaitingEstab);
        assert!(matches!(actions[0], LapdAction::SendOctets(_)));
    }

    #[test]
    fn ua_establishes_link_and_resets_sequence_numbers() {
        let mut e = engine();
        e.start();
        let ua = ua_frame(&e);
        let actions = e.handle_octets(&ua);
        assert_eq!(e.state(), LinkState::Established);
        assert_eq!(e.vs(), 0);
        assert_eq!(e.vr(), 0);
        assert_eq!(e.va(), 0);
        assert!(actions.contains(&LapdAction::Emit(LapdEvent::Established)));
    }

    #[test]
    fn establishment_failure_after_n200_retries() {
        let mut e = engine();
        e.start();
        for _ in 0..3 {
            let actions = e.handle_timer(ExpiredTimer {
                task: TaskId::new(1),
                handle: TimerHandle::new(),
                kind: TimerKind::T200,
            });
            if actions.iter().any(|a| matches!(a, LapdAction::Emit(LapdEvent::Error(LapdErrorKind::EstablishmentFailed)))) {
                assert_eq!(e.state(), LinkState::Down);
                return;
            }
        }
        panic!("expected establishment failure within N200 retries");
    }

    fn establish(e: &mut LapdEngine) {
        e.start();
        let ua = ua_frame(e);
        e.handle_octets(&ua);
    }

    #[test]
    fn scenario_3_retransmission_and_link_loss() {
        let mut e = engine();
        establish(&mut e);

        for _ in 0..3 {
            e.send_data(vec![0xAA]).unwrap();
        }
        assert_eq!(e.in_flight(), 3);

        let rr = Frame {
            address: Address { sapi: 0, command_response: false, tei: 0 },
            control: Control::S { kind: SupervisoryKind::Rr, nr: 2, poll_final: false },
            information: vec![],
        }
        .encode();
        e.handle_octets(&rr);
        assert_eq!(e.va(), 2);
        assert_eq!(e.retransmit_queue.len(), 1);
        assert_eq!(e.retransmit_queue.front().unwrap().0, 2);

        for retry in 0..2 {
            let actions = e.handle_timer(ExpiredTimer {
                task: TaskId::new(1),
                handle: TimerHandle::new(),
                kind: TimerKind::T200,
            });
            assert!(matches!(actions[0], LapdAction::SendOctets(_)), "retry {retry}");
            assert_eq!(e.state(), LinkState::Established);
        }

        let final_actions = e.handle_timer(ExpiredTimer {
            task: TaskId::new(1),
            handle: TimerHandle::new(),
            kind: TimerKind::T200,
        });
        assert_eq!(e.state(), LinkState::Down);
        assert!(final_actions.contains(&LapdAction::Emit(LapdEvent::Error(LapdErrorKind::LinkLost))));
    }

    #[test]
    fn in_order_i_frame_is_delivered_and_acked() {
        let mut e = engine();
        establish(&mut e);

        let i_frame = Frame {
            address: Address { sapi: 0, command_response: false, tei: 0 },
            control: Control::I { ns: 0, nr: 0, poll: false },
            information: vec![9, 9],
        }
        .encode();

        let actions = e.handle_octets(&i_frame);
        assert_eq!(e.vr(), 1);
        assert!(actions.contains(&LapdAction::Emit(LapdEvent::DataIndication(vec![9, 9]))));
    }

    #[test]
    fn out_of_order_i_frame_triggers_reject() {
        let mut e = engine();
        establish(&mut e);

        let i_frame = Frame {
            address: Address { sapi: 0, command_response: false, tei: 0 },
            control: Control::I { ns: 1, nr: 0, poll: false },
            information: vec![1],
        }
        .encode();

        e.handle_octets(&i_frame);
        assert_eq!(e.vr(), 0, "V(R) must not advance on out-of-order frame");
    }

    #[test]
    fn sequence_number_wraps_at_128() {
        let mut e = engine();
        establish(&mut e);
        e.vs = 127;
        e.send_data(vec![1]).unwrap();
        assert_eq!(e.vs(), 0);
    }

    #[test]
    fn window_full_blocks_further_sends() {
        let mut e = engine();
        establish(&mut e);
        for _ in 0..7 {
            e.send_data(vec![1]).unwrap();
        }
        assert_eq!(e.in_flight(), 7);
        assert_eq!(e.send_data(vec![1]), Err(SendError::WindowFull));
    }

    #[test]
    fn rnr_suspends_new_i_frame_transmission_until_rr_clears_it() {
        let mut e = engine();
        establish(&mut e);

        let rnr = Frame {
            address: Address { sapi: 0, command_response: false, tei: 0 },
            control: Control::S { kind: SupervisoryKind::Rnr, nr: 0, poll_final: false },
            information: vec![],
        }
        .encode();
        e.handle_octets(&rnr);
        assert_eq!(e.send_data(vec![1]), Err(SendError::PeerBusy));

        let rr = Frame {
            address: Address { sapi: 0, command_response: false, tei: 0 },
            control: Control::S { kind: SupervisoryKind::Rr, nr: 0, poll_final: false },
            information: vec![],
        }
        .encode();
        e.handle_octets(&rr);
        assert!(e.send_data(vec![1]).is_ok(), "RR must clear peer-busy");
    }

    #[test]
    fn disc_releases_link() {
        let mut e = engine();
        establish(&mut e);

        let disc = Frame {
            address: Address { sapi: 0, command_response: false, tei: 0 },
            control: Control::U { kind: UnnumberedKind::Disc, poll_final: true },
            information: vec![],
        }
        .encode();

        let actions = e.handle_octets(&disc);
        assert_eq!(e.state(), LinkState::Down);
        assert!(actions.contains(&LapdAction::Emit(LapdEvent::Released)));
    }

    #[test]
    fn t203_expiry_sends_rr_poll() {
        let mut e = engine();
        establish(&mut e);
        let actions = e.handle_timer(ExpiredTimer {
            task: TaskId::new(1),
            handle: TimerHandle::new(),
            kind: TimerKind::T203,
        });
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], LapdAction::SendOctets(_)));
    }
}
