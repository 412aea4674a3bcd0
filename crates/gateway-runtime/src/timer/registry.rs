//! High-level timer scheduling API used by the domain state machines.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gateway_core::id::TaskId;

use crate::timer::{TimerBackend, TimerEntry, TimerHandle, TimerKind};

/// Thin, cloneable handle over a shared `TimerBackend`. Each call-control
/// instance, LAPD engine, and NFAS group supervisor holds one of these and
/// uses the named `schedule_*` methods for the timer it owns, so call sites
/// read as "start T303" rather than "insert a generic timer entry".
#[derive(Clone)]
pub struct TimerRegistry {
    backend: Arc<dyn TimerBackend>,
}

impl TimerRegistry {
    pub fn new(backend: Arc<dyn TimerBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> Arc<dyn TimerBackend> {
        self.backend.clone()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Schedule a named, non-repeating protocol timer.
    #[inline]
    pub fn schedule(&self, task: TaskId, kind: TimerKind, duration: Duration) -> TimerHandle {
        self.backend.insert(TimerEntry::after(task, duration, kind))
    }

    /// Schedule with an absolute deadline rather than a relative duration.
    #[inline]
    pub fn schedule_at(&self, task: TaskId, kind: TimerKind, deadline: Instant) -> TimerHandle {
        self.backend.insert(TimerEntry::at(task, deadline, kind))
    }

    /// Schedule the NFAS heartbeat, which reschedules itself every
    /// `interval` until explicitly cancelled.
    #[inline]
    pub fn schedule_heartbeat(&self, task: TaskId, interval: Duration) -> TimerHandle {
        self.backend.insert(TimerEntry::periodic(task, interval))
    }

    #[inline]
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        self.backend.cancel(handle)
    }

    #[inline]
    pub fn active_timers(&self) -> usize {
        self.backend.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    #[inline]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.backend.next_deadline()
    }

    #[inline]
    pub fn time_until_next(&self) -> Option<Duration> {
        self.backend
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl std::fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("backend", &self.backend.name())
            .field("active_timers", &self.backend.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::impls::HeapTimerBackend;

    fn test_registry() -> TimerRegistry {
        TimerRegistry::new(Arc::new(HeapTimerBackend::new()))
    }

    #[test]
    fn schedule_and_cancel_t200() {
        let registry = test_registry();
        let handle = registry.schedule(TaskId::new(1), TimerKind::T200, Duration::from_millis(500));
        assert_eq!(registry.active_timers(), 1);
        registry.cancel(handle);
        assert_eq!(registry.active_timers(), 0);
    }

    #[test]
    fn heartbeat_counts_as_one_active_timer() {
        let registry = test_registry();
        registry.schedule_heartbeat(TaskId::new(1), Duration::from_secs(10));
        assert_eq!(registry.active_timers(), 1);
        assert!(registry.next_deadline().is_some());
    }

    #[test]
    fn clone_shares_the_same_backend() {
        let a = test_registry();
        let b = a.clone();
        a.schedule(TaskId::new(1), TimerKind::T301, Duration::from_secs(1));
        assert_eq!(b.active_timers(), 1);
    }
}
