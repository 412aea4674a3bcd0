//! Timer entry, handle, and kind types.

use gateway_core::id::TaskId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Globally unique timer handle, returned on insert and used to cancel
/// before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

impl TimerHandle {
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TimerHandle(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Which protocol timer this entry represents. Every named timer in the
/// call-control state machines maps to one variant here; the backend
/// doesn't interpret these beyond `Periodic`'s reschedule-after-fire
/// behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// LAPD retransmission timer (Q.921 §5.7.1).
    T200,
    /// LAPD idle-link probe timer (Q.921 §5.7.2).
    T203,
    /// Q.931 overlap-sending timer.
    T301,
    /// Q.931 call-proceeding timer.
    T303,
    /// Q.931 alerting timer.
    T305,
    /// Q.931 release timer.
    T308,
    /// Q.931 connect timer.
    T310,
    /// NFAS primary-link heartbeat probe; periodic.
    NfasHeartbeat,
    /// NFAS switchover deadline watchdog.
    SwitchoverWatchdog,
    /// Generic periodic timer with an explicit reschedule interval.
    Periodic { interval: Duration },
}

impl TimerKind {
    #[inline]
    pub fn is_periodic(&self) -> bool {
        matches!(self, TimerKind::NfasHeartbeat | TimerKind::Periodic { .. })
    }

    /// Interval to reschedule at, if this kind reschedules after firing.
    /// `NfasHeartbeat`'s own interval is supplied by the caller at
    /// `TimerEntry` construction time and copied onto a `Periodic` kind in
    /// `TimerEntry::periodic`, so it never appears bare here.
    #[inline]
    pub fn periodic_interval(&self) -> Option<Duration> {
        match self {
            TimerKind::Periodic { interval } => Some(*interval),
            _ => None,
        }
    }
}

/// An outstanding timer, as stored in the backend.
#[derive(Debug, Clone)]
pub struct TimerEntry {
    pub handle: TimerHandle,
    pub deadline: Instant,
    /// The task to notify on expiry.
    pub task: TaskId,
    pub kind: TimerKind,
}

impl TimerEntry {
    pub fn at(task: TaskId, deadline: Instant, kind: TimerKind) -> Self {
        Self {
            handle: TimerHandle::new(),
            deadline,
            task,
            kind,
        }
    }

    pub fn after(task: TaskId, duration: Duration, kind: TimerKind) -> Self {
        Self::at(task, Instant::now() + duration, kind)
    }

    pub fn periodic(task: TaskId, interval: Duration) -> Self {
        Self::at(task, Instant::now() + interval, TimerKind::Periodic { interval })
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Build the next occurrence of a periodic entry, or `None` if this
    /// entry doesn't reschedule.
    pub fn reschedule(&self) -> Option<Self> {
        let interval = match self.kind {
            TimerKind::NfasHeartbeat => return None, // caller reschedules with its own interval
            TimerKind::Periodic { interval } => interval,
            _ => return None,
        };
        Some(Self {
            handle: TimerHandle::new(),
            deadline: Instant::now() + interval,
            task: self.task,
            kind: self.kind,
        })
    }
}

/// What a task's timer channel receives when one of its timers fires.
#[derive(Debug, Clone, Copy)]
pub struct ExpiredTimer {
    pub task: TaskId,
    pub handle: TimerHandle,
    pub kind: TimerKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let handles: Vec<_> = (0..1000).map(|_| TimerHandle::new()).collect();
        let unique: std::collections::HashSet<_> = handles.iter().collect();
        assert_eq!(handles.len(), unique.len());
    }

    #[test]
    fn periodic_reschedules_with_new_handle() {
        let entry = TimerEntry::periodic(TaskId::new(1), Duration::from_millis(10));
        let rescheduled = entry.reschedule().expect("should reschedule");
        assert_eq!(rescheduled.task, entry.task);
        assert_ne!(rescheduled.handle, entry.handle);
    }

    #[test]
    fn t200_does_not_reschedule() {
        let entry = TimerEntry::after(TaskId::new(1), Duration::from_millis(100), TimerKind::T200);
        assert!(entry.reschedule().is_none());
    }
}
