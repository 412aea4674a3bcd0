//! Per-D-channel call reference table: at most one active Call-Control
//! SM per call reference on a given D-channel endpoint.

use std::collections::HashMap;

use gateway_core::id::TaskId;
use gateway_runtime::timer::TimerRegistry;

use crate::call::CallControlSm;
use crate::config::CallControlConfig;
use crate::event::cause;
use crate::message::{CallReference, Ie, Message, MessageType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallReferenceCollision;

/// Owns every in-progress call on one D-channel endpoint.
pub struct CallTable {
    calls: HashMap<u16, CallControlSm>,
    task: TaskId,
    config: CallControlConfig,
    timers: TimerRegistry,
}

impl CallTable {
    pub fn new(task: TaskId, config: CallControlConfig, timers: TimerRegistry) -> Self {
        Self { calls: HashMap::new(), task, config, timers }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn get(&self, value: u16) -> Option<&CallControlSm> {
        self.calls.get(&value)
    }

    pub fn get_mut(&mut self, value: u16) -> Option<&mut CallControlSm> {
        self.calls.get_mut(&value)
    }

    /// Allocate a fresh call reference for a locally originated call (not
    /// already in the table) and insert a new SM for it.
    pub fn originate(&mut self, starting_value: u16) -> &mut CallControlSm {
        let mut value = starting_value;
        while self.calls.contains_key(&value) {
            value = value.wrapping_add(1);
        }
        let call_ref = CallReference::new(value, true);
        let sm = CallControlSm::new(call_ref, self.task, self.config.clone(), self.timers.clone());
        self.calls.entry(value).or_insert(sm)
    }

    /// Handle an inbound SETUP, enforcing call-reference uniqueness: if
    /// `call_ref.value` collides with an in-progress call this side did
    /// not originate, reject with RELEASE COMPLETE cause 81 instead of
    /// creating a second SM for the same reference.
    pub fn handle_inbound_setup(&mut self, msg: &Message) -> Result<&mut CallControlSm, Message> {
        let value = msg.call_ref.value;
        if let Some(existing) = self.calls.get(&value) {
            use crate::call::CallState;
            if existing.state() != CallState::Null {
                return Err(Message::new(msg.call_ref, MessageType::ReleaseComplete)
                    .with_ie(Ie::cause(cause::INVALID_CALL_REFERENCE, 0)));
            }
        }
        let sm = CallControlSm::new(msg.call_ref, self.task, self.config.clone(), self.timers.clone());
        Ok(self.calls.entry(value).or_insert(sm))
    }

    /// Drop a call reference once its SM has cleared, freeing it for
    /// reuse. No-op if the reference is unknown.
    pub fn remove(&mut self, value: u16) {
        self.calls.remove(&value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_runtime::timer::impls::HeapTimerBackend;
    use std::sync::Arc;

    fn table() -> CallTable {
        let timers = TimerRegistry::new(Arc::new(HeapTimerBackend::new()));
        CallTable::new(TaskId::new(1), CallControlConfig::new(), timers)
    }

    #[test]
    fn originate_picks_a_fresh_reference() {
        let mut t = table();
        let sm = t.originate(1);
        assert_eq!(sm.call_ref().value, 1);
        let sm2 = t.originate(1);
        assert_eq!(sm2.call_ref().value, 2);
    }

    #[test]
    fn colliding_inbound_setup_is_rejected_with_cause_81() {
        let mut t = table();
        t.originate(5);
        let colliding = Message::new(CallReference::new(5, false), MessageType::Setup);
        let result = t.handle_inbound_setup(&colliding);
        let rejection = result.expect_err("collision must be rejected");
        assert_eq!(rejection.message_type, MessageType::ReleaseComplete);
        assert_eq!(rejection.cause(), Some(cause::INVALID_CALL_REFERENCE));
    }

    #[test]
    fn stale_reference_in_null_state_is_reusable() {
        let mut t = table();
        {
            let sm = t.originate(5);
            sm.disconnect(16);
        }
        let fresh = Message::new(CallReference::new(5, false), MessageType::Setup);
        assert!(t.handle_inbound_setup(&fresh).is_ok());
    }
}
