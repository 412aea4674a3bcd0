//! ISUP handler: owns the CIC pool and every in-progress CIC call
//! on this link, dispatching inbound messages against per-CIC state.

use std::collections::HashMap;
use std::time::Instant;

use crate::cic::{CicCall, CicDirection, CicPool, CicState};
use crate::config::IsupConfig;
use crate::event::{IsupAction, IsupEvent};
use crate::message::IsupMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsupHandlerError {
    CicExhausted,
}

impl From<IsupHandlerError> for gerror::GError {
    fn from(err: IsupHandlerError) -> Self {
        use gerror::codes::{ERR_CIC_EXHAUSTED, SYS_ISUP, UC_ALLOCATE};
        let IsupHandlerError::CicExhausted = err;
        gerror::GError::simple(SYS_ISUP, ERR_CIC_EXHAUSTED, UC_ALLOCATE)
    }
}

pub struct IsupHandler {
    pool: CicPool,
    calls: HashMap<u16, CicCall>,
    config: IsupConfig,
}

impl IsupHandler {
    pub fn new(config: IsupConfig) -> Self {
        Self { pool: CicPool::new(&config), calls: HashMap::new(), config }
    }

    pub fn free_cics(&self) -> usize {
        self.pool.free_count()
    }

    pub fn call(&self, cic: u16) -> Option<&CicCall> {
        self.calls.get(&cic)
    }

    /// Originate an outbound call: allocate a CIC, send IAM, enter
    /// `OutgoingSetup`.
    pub fn originate(&mut self, calling: Option<String>, called: String) -> Result<(u16, IsupAction), IsupHandlerError> {
        let cic = self.pool.allocate().ok_or(IsupHandlerError::CicExhausted)?;
        self.calls.insert(
            cic,
            CicCall {
                cic,
                direction: CicDirection::Outgoing,
                state: CicState::OutgoingSetup,
                calling: calling.clone(),
                called: called.clone(),
                start_time: Instant::now(),
                sip_call_id: None,
            },
        );
        Ok((cic, IsupAction::Send(IsupMessage::Iam { cic, calling, called, optional: vec![] })))
    }

    /// Dispatch one inbound ISUP message. `remote_point_code` is used only
    /// for IAM, to resolve glare against a CIC we've already seized.
    pub fn handle_inbound(&mut self, msg: &IsupMessage, remote_point_code: u32) -> Vec<IsupAction> {
        match msg {
            IsupMessage::Iam { cic, calling, called, .. } => self.handle_iam(*cic, calling.clone(), called.clone(), remote_point_code),
            IsupMessage::Acm { cic, .. } => self.handle_acm(*cic),
            IsupMessage::Anm { cic, .. } => self.handle_anm(*cic),
            IsupMessage::Rel { cic, cause, .. } => self.handle_rel(*cic, *cause),
            IsupMessage::Rlc { cic, .. } => self.handle_rlc(*cic),
            IsupMessage::Unknown { cic, message_type, .. } => {
                vec![IsupAction::Emit(IsupEvent::UnknownMessage { cic: *cic, message_type: *message_type })]
            }
        }
    }

    fn handle_iam(&mut self, cic: u16, calling: Option<String>, called: String, remote_point_code: u32) -> Vec<IsupAction> {
        let glare = self
            .calls
            .get(&cic)
            .filter(|existing| existing.direction == CicDirection::Outgoing && existing.state == CicState::OutgoingSetup)
            .map(|existing| (existing.calling.clone(), existing.called.clone()));

        if let Some((our_calling, our_called)) = glare {
            // Glare: both sides seized the same CIC.
            let we_win = self.config.point_code >= remote_point_code;
            if we_win {
                return vec![IsupAction::Emit(IsupEvent::Glare { cic })];
            }
            // We lose: release our CIC and reallocate for our own retry.
            self.calls.remove(&cic);
            self.pool.release(cic);
            let retry = self.originate(our_calling, our_called);
            let mut actions = vec![
                IsupAction::Send(event_cause_rel(cic, crate::event::cause::REQUESTED_CIRCUIT_UNAVAILABLE)),
                IsupAction::Emit(IsupEvent::Glare { cic }),
            ];
            if let Ok((_new_cic, action)) = retry {
                actions.push(action);
            }
            return actions;
        }

        // Claims the CIC in the pool too, unless it's already ours (the
        // common case: an inbound call on a CIC we've never touched).
        self.pool.allocate_exact(cic);
        self.calls.insert(
            cic,
            CicCall {
                cic,
                direction: CicDirection::Incoming,
                state: CicState::IncomingSetup,
                calling: calling.clone(),
                called: called.clone(),
                start_time: Instant::now(),
                sip_call_id: None,
            },
        );
        vec![IsupAction::Emit(IsupEvent::InboundSetup { cic, calling, called })]
    }

    fn handle_acm(&mut self, cic: u16) -> Vec<IsupAction> {
        if let Some(call) = self.calls.get_mut(&cic) {
            call.state = CicState::CallProgress;
        }
        vec![IsupAction::Emit(IsupEvent::Proceeding { cic })]
    }

    fn handle_anm(&mut self, cic: u16) -> Vec<IsupAction> {
        if let Some(call) = self.calls.get_mut(&cic) {
            call.state = CicState::Answered;
        }
        vec![IsupAction::Emit(IsupEvent::Answered { cic })]
    }

    /// Inbound REL: respond with RLC and free the CIC immediately — this
    /// side's RLC is what completes the release.
    fn handle_rel(&mut self, cic: u16, cause: u8) -> Vec<IsupAction> {
        let call = self.calls.remove(&cic);
        self.pool.release(cic);
        let direction = call.as_ref().map(|c| c.direction).unwrap_or(CicDirection::Incoming);
        let answered = call.as_ref().map(|c| c.state == CicState::Answered).unwrap_or(false);
        vec![
            IsupAction::Send(IsupMessage::Rlc { cic, optional: vec![] }),
            IsupAction::Emit(IsupEvent::Released { cic, cause, direction, answered }),
            IsupAction::Emit(IsupEvent::Idle { cic }),
        ]
    }

    /// Inbound RLC, in response to a REL we sent: free the CIC.
    fn handle_rlc(&mut self, cic: u16) -> Vec<IsupAction> {
        self.calls.remove(&cic);
        self.pool.release(cic);
        vec![IsupAction::Emit(IsupEvent::Idle { cic })]
    }

    /// Locally initiated release (e.g. SIP BYE translated to REL).
    pub fn release(&mut self, cic: u16, cause: u8) -> Vec<IsupAction> {
        if let Some(call) = self.calls.get_mut(&cic) {
            call.state = CicState::Releasing;
        }
        vec![IsupAction::Send(IsupMessage::Rel { cic, cause, optional: vec![] })]
    }

    /// Local side progresses an inbound call (the SIP leg sent a
    /// provisional response): send ACM, enter `CallProgress`. The
    /// symmetric counterpart of `handle_acm` for the incoming direction
    /// — symmetric with the inbound direction.
    pub fn progress(&mut self, cic: u16) -> Vec<IsupAction> {
        if let Some(call) = self.calls.get_mut(&cic) {
            call.state = CicState::CallProgress;
        }
        vec![IsupAction::Send(IsupMessage::Acm { cic, optional: vec![] })]
    }

    /// Local side answers an inbound call (the SIP leg sent `200 OK`):
    /// send ANM, enter `Answered`.
    pub fn answer(&mut self, cic: u16) -> Vec<IsupAction> {
        if let Some(call) = self.calls.get_mut(&cic) {
            call.state = CicState::Answered;
        }
        vec![IsupAction::Send(IsupMessage::Anm { cic, optional: vec![] })]
    }
}

// Small helper kept free-standing so `handle_iam`'s glare branch above
// reads as one expression; `REL` needs a cause but no call-state lookup.
fn event_cause_rel(cic: u16, cause: u8) -> IsupMessage {
    IsupMessage::Rel { cic, cause, optional: vec![] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::cause;

    fn handler() -> IsupHandler {
        IsupHandler::new(IsupConfig { cic_min: 1, cic_max: 1000, point_code: 5 })
    }

    #[test]
    fn originate_then_acm_then_anm() {
        let mut h = handler();
        let (cic, _iam) = h.originate(Some("100".into()), "200".into()).unwrap();
        h.handle_inbound(&IsupMessage::Acm { cic, optional: vec![] }, 1);
        assert_eq!(h.call(cic).unwrap().state, CicState::CallProgress);
        h.handle_inbound(&IsupMessage::Anm { cic, optional: vec![] }, 1);
        assert_eq!(h.call(cic).unwrap().state, CicState::Answered);
    }

    #[test]
    fn scenario_4_rel_then_rlc_frees_cic() {
        let mut h = handler();
        let (cic, _) = h.originate(Some("100".into()), "200".into()).unwrap();
        let actions = h.handle_inbound(&IsupMessage::Rel { cic, cause: cause::USER_BUSY, optional: vec![] }, 1);
        assert!(actions.iter().any(|a| matches!(a, IsupAction::Emit(IsupEvent::Released { cause: 17, .. }))));
        assert!(h.call(cic).is_none());
        assert_eq!(h.free_cics(), h.pool.capacity());
    }

    #[test]
    fn scenario_5_glare_loser_reallocates() {
        // Higher point code wins.
        let mut h = handler(); // point_code = 5
        let (cic, _) = h.originate(Some("100".into()), "200".into()).unwrap();
        let actions = h.handle_inbound(
            &IsupMessage::Iam { cic, calling: Some("999".into()), called: "888".into(), optional: vec![] },
            9, // remote point code higher: we lose
        );
        assert!(actions.iter().any(|a| matches!(a, IsupAction::Emit(IsupEvent::Glare { .. }))));
        // a retry IAM was sent on a fresh CIC
        assert!(actions.iter().any(|a| matches!(a, IsupAction::Send(IsupMessage::Iam { cic: new_cic, .. }) if *new_cic != cic)));
    }

    #[test]
    fn unknown_message_type_does_not_touch_state() {
        let mut h = handler();
        let (cic, _) = h.originate(None, "200".into()).unwrap();
        let before = h.call(cic).unwrap().state;
        h.handle_inbound(&IsupMessage::Unknown { message_type: 0xFE, cic, body: vec![] }, 1);
        assert_eq!(h.call(cic).unwrap().state, before);
    }

    #[test]
    fn progress_then_answer_drive_an_inbound_call_to_sip_success() {
        let mut h = handler();
        let actions = h.handle_inbound(&IsupMessage::Iam { cic: 12, calling: Some("100".into()), called: "200".into(), optional: vec![] }, 1);
        assert!(actions.iter().any(|a| matches!(a, IsupAction::Emit(IsupEvent::InboundSetup { cic: 12, .. }))));

        let actions = h.progress(12);
        assert!(matches!(&actions[0], IsupAction::Send(IsupMessage::Acm { cic: 12, .. })));
        assert_eq!(h.call(12).unwrap().state, CicState::CallProgress);

        let actions = h.answer(12);
        assert!(matches!(&actions[0], IsupAction::Send(IsupMessage::Anm { cic: 12, .. })));
        assert_eq!(h.call(12).unwrap().state, CicState::Answered);
    }

    #[test]
    fn exhaustion_surfaces_as_error() {
        let mut h = IsupHandler::new(IsupConfig { cic_min: 1, cic_max: 1, point_code: 1 });
        h.originate(None, "1".into()).unwrap();
        assert_eq!(h.originate(None, "2".into()).unwrap_err(), IsupHandlerError::CicExhausted);
    }

    #[test]
    fn handler_error_converts_to_gerror_with_matching_code() {
        let gerr: gerror::GError = IsupHandlerError::CicExhausted.into();
        assert_eq!(gerr.system(), &gerror::codes::SYS_ISUP);
        assert_eq!(gerr.error_code(), &gerror::codes::ERR_CIC_EXHAUSTED);
    }
}
