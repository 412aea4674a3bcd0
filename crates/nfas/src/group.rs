//! NFAS group: wraps multiple LAPD engines (one per span) into one
//! logical D-channel endpoint with primary/backup election, heartbeat
//! supervision, and switchover.

use std::collections::VecDeque;
use std::time::Instant;

use gateway_core::id::TaskId;
use gateway_runtime::timer::{ExpiredTimer, TimerHandle, TimerKind, TimerRegistry};
use lapd::{LapdAction, LapdEngine, LapdEvent, LinkState};

use crate::config::{HeartbeatMode, NfasConfig};
use crate::event::{NfasAction, NfasConfigError, NfasEvent, SwitchoverReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Inactive,
    Active,
    Switching,
}

struct Span {
    span_id: u32,
    engine: LapdEngine,
}

/// Invariant: whenever `state == Active`, exactly one span is
/// `active_idx` and its engine is `Established`.
pub struct NfasGroup {
    group_id: u32,
    spans: Vec<Span>,
    active_idx: Option<usize>,
    state: GroupState,
    config: NfasConfig,
    task: TaskId,
    timers: TimerRegistry,
    heartbeat_timer: Option<TimerHandle>,
    switchover_watchdog: Option<TimerHandle>,
    switch_reason: Option<SwitchoverReason>,
    switch_from_span: Option<u32>,
    switch_candidates: VecDeque<usize>,
    current_candidate: Option<usize>,
    switch_attempts: u32,
    consecutive_heartbeat_failures: u32,
    switchover_count: u32,
    heartbeats_sent: u32,
    heartbeats_lost: u32,
    calls_handled: u32,
    last_switchover: Option<Instant>,
    queued: VecDeque<Vec<u8>>,
}

impl NfasGroup {
    /// `spans` is ordered `[primary, backup_1, backup_2, ...]`.
    pub fn new(
        group_id: u32,
        spans: Vec<(u32, LapdEngine)>,
        config: NfasConfig,
        task: TaskId,
        timers: TimerRegistry,
    ) -> Result<Self, NfasConfigError> {
        if spans.is_empty() {
            return Err(NfasConfigError::EmptySpanList);
        }
        Ok(Self {
            group_id,
            spans: spans.into_iter().map(|(span_id, engine)| Span { span_id, engine }).collect(),
            active_idx: None,
            state: GroupState::Inactive,
            config,
            task,
            timers,
            heartbeat_timer: None,
            switchover_watchdog: None,
            switch_reason: None,
            switch_from_span: None,
            switch_candidates: VecDeque::new(),
            current_candidate: None,
            switch_attempts: 0,
            consecutive_heartbeat_failures: 0,
            switchover_count: 0,
            heartbeats_sent: 0,
            heartbeats_lost: 0,
            calls_handled: 0,
            last_switchover: None,
            queued: VecDeque::new(),
        })
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn active_span_id(&self) -> Option<u32> {
        self.active_idx.map(|idx| self.spans[idx].span_id)
    }

    pub fn switchover_count(&self) -> u32 {
        self.switchover_count
    }

    pub fn heartbeats_lost(&self) -> u32 {
        self.heartbeats_lost
    }

    pub fn heartbeats_sent(&self) -> u32 {
        self.heartbeats_sent
    }

    pub fn calls_handled(&self) -> u32 {
        self.calls_handled
    }

    /// Call control reports a new call routed through this group's active
    /// span; kept here alongside the other per-group metrics rather than
    /// with call control.
    pub fn record_call_handled(&mut self) {
        self.calls_handled += 1;
    }

    pub fn is_single_span(&self) -> bool {
        self.spans.len() < 2
    }

    /// Start the primary span; backups stay armed but send no SABME until
    /// promoted.
    pub fn start(&mut self) -> Vec<NfasAction> {
        let primary_id = self.spans[0].span_id;
        let actions = self.spans[0].engine.start();
        self.to_nfas_actions(primary_id, actions)
    }

    fn span_idx(&self, span_id: u32) -> Option<usize> {
        self.spans.iter().position(|s| s.span_id == span_id)
    }

    fn to_nfas_actions(&mut self, span_id: u32, actions: Vec<LapdAction>) -> Vec<NfasAction> {
        let mut out = Vec::new();
        let span_idx = self.span_idx(span_id).expect("span_id must belong to this group");
        for action in actions {
            match action {
                LapdAction::SendOctets(octets) => out.push(NfasAction::SendOnSpan { span_id, octets }),
                LapdAction::Emit(event) => out.extend(self.handle_lapd_event(span_idx, event)),
            }
        }
        out
    }

    fn handle_lapd_event(&mut self, span_idx: usize, event: LapdEvent) -> Vec<NfasAction> {
        match event {
            LapdEvent::Established => self.on_span_established(span_idx),
            LapdEvent::Released => self.on_span_failed(span_idx, SwitchoverReason::ActiveLinkReleased),
            LapdEvent::Error(_) => self.on_span_failed(span_idx, SwitchoverReason::ActiveLinkError),
            LapdEvent::DataIndication(payload) => {
                vec![NfasAction::DataIndication { span_id: self.spans[span_idx].span_id, payload }]
            }
            LapdEvent::FrameDropped(_) => Vec::new(),
        }
    }

    fn on_span_established(&mut self, span_idx: usize) -> Vec<NfasAction> {
        match self.state {
            GroupState::Inactive if span_idx == 0 => {
                self.active_idx = Some(span_idx);
                self.state = GroupState::Active;
                self.arm_heartbeat();
                vec![NfasAction::Emit(NfasEvent::GroupActive { span_id: self.spans[span_idx].span_id })]
            }
            GroupState::Switching if self.current_candidate == Some(span_idx) => {
                self.complete_switchover(span_idx)
            }
            _ => Vec::new(),
        }
    }

    fn complete_switchover(&mut self, new_idx: usize) -> Vec<NfasAction> {
        self.cancel_switchover_watchdog();
        let from = self.switch_from_span.take().unwrap_or(self.spans[new_idx].span_id);
        let to = self.spans[new_idx].span_id;
        self.active_idx = Some(new_idx);
        self.current_candidate = None;
        self.state = GroupState::Active;
        self.switchover_count += 1;
        self.last_switchover = Some(Instant::now());
        self.consecutive_heartbeat_failures = 0;
        self.arm_heartbeat();

        let reason = self.switch_reason.unwrap_or(SwitchoverReason::ActiveLinkError);
        let mut actions = vec![NfasAction::Emit(NfasEvent::SwitchoverCompleted { from, to, reason })];

        while let Some(payload) = self.queued.pop_front() {
            let span_id = self.spans[new_idx].span_id;
            let send_actions = self.spans[new_idx].engine.send_data(payload);
            if let Ok(send_actions) = send_actions {
                actions.extend(self.to_nfas_actions(span_id, send_actions));
            }
        }
        actions
    }

    fn on_span_failed(&mut self, span_idx: usize, reason: SwitchoverReason) -> Vec<NfasAction> {
        let is_active = self.active_idx == Some(span_idx);
        let is_switch_candidate = self.state == GroupState::Switching && self.current_candidate == Some(span_idx);

        if is_active {
            self.trigger_switchover(span_idx, reason)
        } else if is_switch_candidate {
            self.try_next_candidate()
        } else {
            Vec::new()
        }
    }

    fn trigger_switchover(&mut self, failed_idx: usize, reason: SwitchoverReason) -> Vec<NfasAction> {
        if self.is_single_span() {
            self.state = GroupState::Inactive;
            self.active_idx = None;
            self.cancel_heartbeat();
            return vec![NfasAction::Emit(NfasEvent::GroupInactive { reason })];
        }

        self.state = GroupState::Switching;
        self.switch_reason = Some(reason);
        self.switch_from_span = Some(self.spans[failed_idx].span_id);
        self.active_idx = None;
        self.cancel_heartbeat();
        self.switch_attempts = 0;
        self.switch_candidates = (0..self.spans.len()).filter(|&i| i != failed_idx).collect();

        // The heartbeat in flight when the active span failed is retried on
        // whichever span takes over.
        if self.config.heartbeat_mode == HeartbeatMode::StatusEnquiry {
            self.queued.push_back(status_enquiry_payload());
        }

        self.try_next_candidate()
    }

    fn try_next_candidate(&mut self) -> Vec<NfasAction> {
        loop {
            if self.switch_attempts >= self.config.max_switchover_attempts {
                self.state = GroupState::Inactive;
                self.current_candidate = None;
                let reason = self.switch_reason.unwrap_or(SwitchoverReason::ActiveLinkError);
                return vec![NfasAction::Emit(NfasEvent::GroupInactive { reason })];
            }
            let Some(idx) = self.switch_candidates.pop_front() else {
                self.state = GroupState::Inactive;
                self.current_candidate = None;
                let reason = self.switch_reason.unwrap_or(SwitchoverReason::ActiveLinkError);
                return vec![NfasAction::Emit(NfasEvent::GroupInactive { reason })];
            };
            if self.spans[idx].engine.state() == LinkState::Down {
                self.switch_attempts += 1;
                self.current_candidate = Some(idx);
                let span_id = self.spans[idx].span_id;
                let actions = self.spans[idx].engine.start();
                self.arm_switchover_watchdog();
                return self.to_nfas_actions(span_id, actions);
            }
        }
    }

    fn arm_heartbeat(&mut self) {
        self.heartbeat_timer = Some(self.timers.schedule(self.task, TimerKind::NfasHeartbeat, self.config.heartbeat_interval));
    }

    fn cancel_heartbeat(&mut self) {
        if let Some(h) = self.heartbeat_timer.take() {
            self.timers.cancel(h);
        }
    }

    fn arm_switchover_watchdog(&mut self) {
        self.cancel_switchover_watchdog();
        self.switchover_watchdog = Some(self.timers.schedule(self.task, TimerKind::SwitchoverWatchdog, self.config.switchover_timeout));
    }

    fn cancel_switchover_watchdog(&mut self) {
        if let Some(h) = self.switchover_watchdog.take() {
            self.timers.cancel(h);
        }
    }

    /// Dispatch one inbound frame on `span_id`'s D-channel.
    pub fn handle_span_frame(&mut self, span_id: u32, octets: &[u8]) -> Vec<NfasAction> {
        let idx = match self.span_idx(span_id) {
            Some(idx) => idx,
            None => return Vec::new(),
        };
        let actions = self.spans[idx].engine.handle_octets(octets);
        self.to_nfas_actions(span_id, actions)
    }

    /// Dispatch a timer firing scoped to one span's LAPD engine (T200/T203).
    pub fn handle_span_timer(&mut self, span_id: u32, expired: ExpiredTimer) -> Vec<NfasAction> {
        let idx = match self.span_idx(span_id) {
            Some(idx) => idx,
            None => return Vec::new(),
        };
        let actions = self.spans[idx].engine.handle_timer(expired);
        self.to_nfas_actions(span_id, actions)
    }

    /// Dispatch a group-scoped timer firing (heartbeat or switchover
    /// watchdog), delivered on this group's own task queue.
    pub fn handle_group_timer(&mut self, expired: ExpiredTimer) -> Vec<NfasAction> {
        match expired.kind {
            TimerKind::NfasHeartbeat => self.fire_heartbeat(),
            TimerKind::SwitchoverWatchdog => {
                if self.state == GroupState::Switching {
                    self.try_next_candidate()
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    fn fire_heartbeat(&mut self) -> Vec<NfasAction> {
        let Some(active_idx) = self.active_idx else { return Vec::new() };
        let active_span_id = self.spans[active_idx].span_id;

        let dispatch_failed = match self.config.heartbeat_mode {
            HeartbeatMode::LapdPoll => {
                let poll = self.spans[active_idx].engine.send_poll();
                match poll {
                    Some(action) => {
                        self.record_heartbeat_sent();
                        return self.to_nfas_actions(active_span_id, vec![action]);
                    }
                    None => true,
                }
            }
            HeartbeatMode::StatusEnquiry => {
                let payload = status_enquiry_payload();
                match self.spans[active_idx].engine.send_data(payload) {
                    Ok(actions) => {
                        self.record_heartbeat_sent();
                        return self.to_nfas_actions(active_span_id, actions);
                    }
                    Err(_) => true,
                }
            }
        };

        let mut actions = Vec::new();
        if dispatch_failed {
            self.heartbeats_lost += 1;
            self.consecutive_heartbeat_failures += 1;
            actions.push(NfasAction::Emit(NfasEvent::HeartbeatLost {
                span_id: active_span_id,
                consecutive: self.consecutive_heartbeat_failures,
            }));
            if self.consecutive_heartbeat_failures >= self.config.heartbeat_loss_threshold {
                actions.extend(self.trigger_switchover(active_idx, SwitchoverReason::HeartbeatLossThreshold));
                return actions;
            }
        }
        self.arm_heartbeat();
        actions
    }

    fn record_heartbeat_sent(&mut self) {
        self.heartbeats_sent += 1;
        self.consecutive_heartbeat_failures = 0;
        self.arm_heartbeat();
    }

    /// Send a Q.931 payload on the active span, or queue it (bounded,
    /// dropping the oldest on overflow) while the group is `Switching` or
    /// `Inactive`.
    pub fn send(&mut self, payload: Vec<u8>) -> Vec<NfasAction> {
        if let Some(idx) = self.active_idx {
            let span_id = self.spans[idx].span_id;
            return match self.spans[idx].engine.send_data(payload) {
                Ok(actions) => self.to_nfas_actions(span_id, actions),
                Err(_) => self.enqueue(payload),
            };
        }
        self.enqueue(payload)
    }

    fn enqueue(&mut self, payload: Vec<u8>) -> Vec<NfasAction> {
        self.queued.push_back(payload);
        if self.queued.len() > self.config.queue_depth {
            self.queued.pop_front();
            return vec![NfasAction::Emit(NfasEvent::QueueOverflow { dropped: 1 })];
        }
        Vec::new()
    }

    /// Explicit operator-triggered switchover, optionally to a named span.
    pub fn force_switchover(&mut self, target: Option<u32>) -> Vec<NfasAction> {
        let Some(active_idx) = self.active_idx else { return Vec::new() };
        if let Some(target_id) = target {
            if let Some(target_idx) = self.span_idx(target_id) {
                self.state = GroupState::Switching;
                self.switch_reason = Some(SwitchoverReason::Forced);
                self.switch_from_span = Some(self.spans[active_idx].span_id);
                self.active_idx = None;
                self.cancel_heartbeat();
                self.switch_attempts = 0;
                self.switch_candidates = VecDeque::from([target_idx]);
                return self.try_next_candidate();
            }
        }
        self.trigger_switchover(active_idx, SwitchoverReason::Forced)
    }
}

fn status_enquiry_payload() -> Vec<u8> {
    q931::Message::new(q931::CallReference::new(0, false), q931::MessageType::StatusEnquiry).encode()
}
