//! Timer subsystem: pluggable backend, high-level scheduling API, and a
//! background thread that delivers firings into the owning task's queue.
//!
//! ```text
//!                     TimerRegistry (API)
//!                           │
//!                           ▼
//!               ┌───────────────────────┐
//!               │   dyn TimerBackend    │
//!               └───────────────────────┘
//!                           │
//!                           ▼
//!                   HeapTimerBackend
//!                           │
//!                           ▼
//!   timer thread ──poll_expired()──► TimerDispatcher ──► task's channel
//! ```

mod entry;
pub mod impls;
mod registry;
mod worker;

pub use entry::{ExpiredTimer, TimerEntry, TimerHandle, TimerKind};
pub use impls::{create_backend, HeapTimerBackend, TimerBackendType};
pub use registry::TimerRegistry;
pub use worker::{spawn_timer_thread, TimerDispatcher, TimerStats, TimerThreadConfig, TimerThreadHandle};

use std::time::Instant;

/// Pluggable timer storage. The heap-backed MVP implementation is the only
/// one in this crate; a timing-wheel or kernel-timerfd backend could slot
/// in here without changing `TimerRegistry` or the dispatch thread.
pub trait TimerBackend: Send + Sync {
    fn insert(&self, entry: TimerEntry) -> TimerHandle;
    fn cancel(&self, handle: TimerHandle) -> bool;
    fn poll_expired(&self, now: Instant) -> Vec<ExpiredTimer>;
    fn next_deadline(&self) -> Option<Instant>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn name(&self) -> &'static str {
        "unknown"
    }
}
