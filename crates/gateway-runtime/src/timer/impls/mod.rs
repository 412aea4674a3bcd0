//! Pluggable timer backend implementations.

mod heap;

pub use heap::{HeapTimerBackend, HeapTimerStats};

/// Selectable backend kind, for configuration surfaces that want to name
/// one without importing its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerBackendType {
    BinaryHeap,
}

pub fn create_backend(kind: TimerBackendType) -> std::sync::Arc<dyn super::TimerBackend> {
    match kind {
        TimerBackendType::BinaryHeap => std::sync::Arc::new(HeapTimerBackend::new()),
    }
}
