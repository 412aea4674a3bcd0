//! Session Registry: atomic four-way correlation across Q.931, ISUP, SIP,
//! and RTP identities for one call.

use std::collections::HashMap;
use std::time::Instant;

use gateway_core::SpinLock;
use rtp::PortPair;

use crate::event::CallEventRecord;
use crate::record::{SessionId, SessionKey, SessionRecord, SlotKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// One of `key`'s non-empty slots already names an existing session.
    /// No field of the existing record is touched and no slot is consumed.
    KeyCollision,
    NotFound,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::KeyCollision => write!(f, "one or more keys already belong to a session"),
            RegistryError::NotFound => write!(f, "no session with that key"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<RegistryError> for gerror::GError {
    fn from(err: RegistryError) -> Self {
        use gerror::codes::{ERR_KEY_COLLISION, ERR_NOT_FOUND, SYS_SESSION, UC_INSERT, UC_LOOKUP};
        match err {
            RegistryError::KeyCollision => gerror::GError::simple(SYS_SESSION, ERR_KEY_COLLISION, UC_INSERT),
            RegistryError::NotFound => gerror::GError::simple(SYS_SESSION, ERR_NOT_FOUND, UC_LOOKUP),
        }
    }
}

struct Inner {
    next_id: u64,
    records: HashMap<SessionId, SessionRecord>,
    by_call_ref: HashMap<u16, SessionId>,
    by_cic: HashMap<u16, SessionId>,
    by_sip_call_id: HashMap<String, SessionId>,
    by_rtp_port: HashMap<u16, SessionId>,
    /// Count of the four slots still held, per session; the record is
    /// dropped only when this reaches zero.
    live_slots: HashMap<SessionId, u8>,
}

impl Inner {
    fn new() -> Self {
        Self {
            next_id: 1,
            records: HashMap::new(),
            by_call_ref: HashMap::new(),
            by_cic: HashMap::new(),
            by_sip_call_id: HashMap::new(),
            by_rtp_port: HashMap::new(),
            live_slots: HashMap::new(),
        }
    }

    fn collides(&self, key: &SessionKey) -> bool {
        key.call_ref.map(|v| self.by_call_ref.contains_key(&v)).unwrap_or(false)
            || key.cic.map(|v| self.by_cic.contains_key(&v)).unwrap_or(false)
            || key.sip_call_id.as_ref().map(|v| self.by_sip_call_id.contains_key(v)).unwrap_or(false)
            || key.rtp_port.map(|v| self.by_rtp_port.contains_key(&v)).unwrap_or(false)
    }
}

/// Guarded by a [`SpinLock`] held only for the duration of one
/// insert/lookup/release call; no user-visible suspension happens while
/// the lock is held, since a fallible allocation boundary (the RTP pool)
/// is never invoked here.
pub struct SessionRegistry {
    inner: SpinLock<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { inner: SpinLock::new(Inner::new()) }
    }

    /// Insert a new session keyed by whichever of the four identities are
    /// known at creation time. Fails atomically on any collision.
    pub fn insert(&self, key: SessionKey, rtp_pair: Option<PortPair>) -> Result<SessionId, RegistryError> {
        let mut inner = self.inner.lock();
        if inner.collides(&key) {
            return Err(RegistryError::KeyCollision);
        }

        let id = SessionId::new(inner.next_id);
        inner.next_id += 1;

        let mut slots = 0u8;
        if let Some(v) = key.call_ref {
            inner.by_call_ref.insert(v, id);
            slots += 1;
        }
        if let Some(v) = key.cic {
            inner.by_cic.insert(v, id);
            slots += 1;
        }
        if let Some(v) = key.sip_call_id.clone() {
            inner.by_sip_call_id.insert(v, id);
            slots += 1;
        }
        if let Some(v) = key.rtp_port.or(rtp_pair.map(|p| p.rtp)) {
            inner.by_rtp_port.insert(v, id);
            slots += 1;
        }

        let record = SessionRecord::new(id, key, rtp_pair);
        inner.records.insert(id, record);
        inner.live_slots.insert(id, slots.max(1));
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, id: SessionId) -> Option<SessionRecord> {
        self.inner.lock().records.get(&id).cloned()
    }

    pub fn lookup_by_call_ref(&self, call_ref: u16) -> Option<SessionRecord> {
        let inner = self.inner.lock();
        inner.by_call_ref.get(&call_ref).and_then(|id| inner.records.get(id)).cloned()
    }

    pub fn lookup_by_cic(&self, cic: u16) -> Option<SessionRecord> {
        let inner = self.inner.lock();
        inner.by_cic.get(&cic).and_then(|id| inner.records.get(id)).cloned()
    }

    pub fn lookup_by_sip_call_id(&self, sip_call_id: &str) -> Option<SessionRecord> {
        let inner = self.inner.lock();
        inner.by_sip_call_id.get(sip_call_id).and_then(|id| inner.records.get(id)).cloned()
    }

    pub fn lookup_by_rtp_port(&self, rtp_port: u16) -> Option<SessionRecord> {
        let inner = self.inner.lock();
        inner.by_rtp_port.get(&rtp_port).and_then(|id| inner.records.get(id)).cloned()
    }

    /// Record that the call reached the answered/active state, for the
    /// eventual `CallEventRecord`'s talk-time measurement.
    pub fn mark_answered(&self, id: SessionId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(&id).ok_or(RegistryError::NotFound)?;
        record.answered_at.get_or_insert(Instant::now());
        Ok(())
    }

    /// Record the cause code that will eventually close this session,
    /// for the `CallEventRecord` built on final release.
    pub fn set_cause(&self, id: SessionId, cause: u8) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(&id).ok_or(RegistryError::NotFound)?;
        record.cause = Some(cause);
        Ok(())
    }

    /// Release one named slot. The record (and all its other slots) is
    /// removed only once every slot it was created with has been
    /// released, at which point a `CallEventRecord` is returned for the
    /// caller to hand to an external persistence subsystem; every other
    /// release returns `None`.
    pub fn release(&self, id: SessionId, slot: SlotKind) -> Result<Option<CallEventRecord>, RegistryError> {
        let mut inner = self.inner.lock();
        let record = inner.records.get(&id).cloned().ok_or(RegistryError::NotFound)?;

        match slot {
            SlotKind::CallRef => {
                if let Some(v) = record.call_ref {
                    inner.by_call_ref.remove(&v);
                }
            }
            SlotKind::Cic => {
                if let Some(v) = record.cic {
                    inner.by_cic.remove(&v);
                }
            }
            SlotKind::SipCallId => {
                if let Some(v) = &record.sip_call_id {
                    inner.by_sip_call_id.remove(v);
                }
            }
            SlotKind::RtpPort => {
                if let Some(p) = record.rtp_pair {
                    inner.by_rtp_port.remove(&p.rtp);
                }
            }
        }

        let remaining = inner.live_slots.get_mut(&id).map(|count| {
            *count = count.saturating_sub(1);
            *count
        });
        if remaining == Some(0) {
            inner.records.remove(&id);
            inner.live_slots.remove(&id);
            return Ok(Some(CallEventRecord {
                call_ref: record.call_ref,
                cic: record.cic,
                sip_call_id: record.sip_call_id,
                started_at: record.started_at,
                answered_at: record.answered_at,
                released_at: Instant::now(),
                cause: record.cause,
            }));
        }
        Ok(None)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
