//! BinaryHeap-based timer backend.
//!
//! Same complexity tradeoffs as the scheduler's preemption-timer backend
//! this was adapted from: O(log n) insert, O(1) amortized cancel via a
//! lazily-swept cancelled set, O(k log n) poll for k expired entries.

use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;
use std::time::Instant;

use crate::timer::{ExpiredTimer, TimerBackend, TimerEntry, TimerHandle};

struct HeapEntry(TimerEntry);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.deadline == other.0.deadline && self.0.handle == other.0.handle
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match other.0.deadline.cmp(&self.0.deadline) {
            std::cmp::Ordering::Equal => other.0.handle.0.cmp(&self.0.handle.0),
            ord => ord,
        }
    }
}

struct HeapInner {
    heap: BinaryHeap<HeapEntry>,
    cancelled: HashSet<TimerHandle>,
    total_inserted: u64,
    total_fired: u64,
    total_cancelled: u64,
}

impl HeapInner {
    fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            cancelled: HashSet::with_capacity(capacity / 4),
            total_inserted: 0,
            total_fired: 0,
            total_cancelled: 0,
        }
    }
}

/// Thread-safe timer backend behind a single `Mutex`, held briefly on
/// insert/cancel/poll.
pub struct HeapTimerBackend {
    inner: Mutex<HeapInner>,
}

impl HeapTimerBackend {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HeapInner::new(capacity)),
        }
    }

    pub fn stats(&self) -> HeapTimerStats {
        let inner = self.inner.lock().unwrap();
        HeapTimerStats {
            active: inner.heap.len(),
            pending_cancellations: inner.cancelled.len(),
            total_inserted: inner.total_inserted,
            total_fired: inner.total_fired,
            total_cancelled: inner.total_cancelled,
        }
    }
}

impl Default for HeapTimerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerBackend for HeapTimerBackend {
    fn insert(&self, entry: TimerEntry) -> TimerHandle {
        let handle = entry.handle;
        let mut inner = self.inner.lock().unwrap();
        inner.heap.push(HeapEntry(entry));
        inner.total_inserted += 1;
        handle
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let inserted = inner.cancelled.insert(handle);
        if inserted {
            inner.total_cancelled += 1;
        }
        inserted
    }

    fn poll_expired(&self, now: Instant) -> Vec<ExpiredTimer> {
        let mut inner = self.inner.lock().unwrap();
        let mut expired = Vec::new();
        let mut to_reschedule = Vec::new();

        while let Some(entry) = inner.heap.peek() {
            if entry.0.deadline > now {
                break;
            }

            let entry = inner.heap.pop().unwrap().0;

            if inner.cancelled.remove(&entry.handle) {
                continue;
            }

            if let Some(rescheduled) = entry.reschedule() {
                to_reschedule.push(rescheduled);
            }

            inner.total_fired += 1;

            expired.push(ExpiredTimer {
                task: entry.task,
                handle: entry.handle,
                kind: entry.kind,
            });
        }

        for entry in to_reschedule {
            inner.heap.push(HeapEntry(entry));
        }

        if inner.heap.is_empty() {
            inner.cancelled.clear();
        }

        expired
    }

    fn next_deadline(&self) -> Option<Instant> {
        let inner = self.inner.lock().unwrap();
        inner.heap.peek().map(|e| e.0.deadline)
    }

    fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.heap.len().saturating_sub(inner.cancelled.len())
    }

    fn name(&self) -> &'static str {
        "binary_heap"
    }
}

#[derive(Debug, Clone)]
pub struct HeapTimerStats {
    pub active: usize,
    pub pending_cancellations: usize,
    pub total_inserted: u64,
    pub total_fired: u64,
    pub total_cancelled: u64,
}
