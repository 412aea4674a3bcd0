//! Timer thread and delivery to owning tasks.
//!
//! A single background thread polls the backend and, for each expired
//! timer, looks up the owning task's channel in the `TimerDispatcher` and
//! pushes an `ExpiredTimer` onto it — merged into the same queue the task
//! already reads frames and commands from, so timer firings are processed
//! in order with ordinary messages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use gateway_core::channel::Sender;
use gateway_core::id::TaskId;
use gateway_core::spinlock::SpinLock;

use crate::timer::{ExpiredTimer, TimerBackend};

#[derive(Debug, Clone)]
pub struct TimerThreadConfig {
    pub max_poll_interval: Duration,
    pub min_sleep: Duration,
    pub thread_name: String,
}

impl Default for TimerThreadConfig {
    fn default() -> Self {
        Self {
            max_poll_interval: Duration::from_millis(5),
            min_sleep: Duration::from_micros(100),
            thread_name: "gateway-timer".into(),
        }
    }
}

/// Routes expired timers to the channel of the task that owns them.
///
/// Tasks register their `Sender<ExpiredTimer>` on startup and deregister it
/// on exit; a timer firing for an unregistered (already-exited) task is
/// silently dropped rather than treated as an error, since a task racing
/// its own shutdown against an in-flight timer is an expected occurrence,
/// not a bug.
#[derive(Default)]
pub struct TimerDispatcher {
    routes: SpinLock<HashMap<TaskId, Sender<ExpiredTimer>>>,
}

impl TimerDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task: TaskId, sender: Sender<ExpiredTimer>) {
        self.routes.lock().insert(task, sender);
    }

    pub fn unregister(&self, task: TaskId) {
        self.routes.lock().remove(&task);
    }

    fn deliver(&self, expired: ExpiredTimer) {
        let routes = self.routes.lock();
        if let Some(sender) = routes.get(&expired.task) {
            let _ = sender.try_send(expired);
        }
    }
}

pub struct TimerThreadHandle {
    handle: Option<JoinHandle<TimerStats>>,
    shutdown: Arc<AtomicBool>,
}

impl TimerThreadHandle {
    pub fn shutdown(mut self) -> TimerStats {
        self.shutdown.store(true, Ordering::Release);
        self.handle
            .take()
            .expect("handle already taken")
            .join()
            .expect("timer thread panicked")
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimerStats {
    pub poll_count: u64,
    pub timers_fired: u64,
    pub max_batch_size: usize,
}

pub fn spawn_timer_thread(
    backend: Arc<dyn TimerBackend>,
    dispatcher: Arc<TimerDispatcher>,
    config: TimerThreadConfig,
) -> TimerThreadHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    let handle = thread::Builder::new()
        .name(config.thread_name.clone())
        .spawn(move || timer_loop(backend, dispatcher, shutdown_clone, config))
        .expect("failed to spawn timer thread");

    TimerThreadHandle {
        handle: Some(handle),
        shutdown,
    }
}

fn timer_loop(
    backend: Arc<dyn TimerBackend>,
    dispatcher: Arc<TimerDispatcher>,
    shutdown: Arc<AtomicBool>,
    config: TimerThreadConfig,
) -> TimerStats {
    let mut stats = TimerStats::default();

    while !shutdown.load(Ordering::Relaxed) {
        let poll_start = Instant::now();

        let expired = backend.poll_expired(poll_start);
        let batch_size = expired.len();

        stats.poll_count += 1;
        stats.timers_fired += batch_size as u64;
        stats.max_batch_size = stats.max_batch_size.max(batch_size);

        for timer in expired {
            dispatcher.deliver(timer);
        }

        let sleep_duration = calculate_sleep(&backend, &config);
        if sleep_duration > Duration::ZERO {
            thread::sleep(sleep_duration);
        }
    }

    stats
}

fn calculate_sleep(backend: &Arc<dyn TimerBackend>, config: &TimerThreadConfig) -> Duration {
    match backend.next_deadline() {
        Some(deadline) => {
            let now = Instant::now();
            if deadline <= now {
                Duration::ZERO
            } else {
                (deadline - now)
                    .min(config.max_poll_interval)
                    .max(config.min_sleep)
            }
        }
        None => config.max_poll_interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::impls::HeapTimerBackend;
    use crate::timer::{TimerEntry, TimerKind};
    use gateway_core::channel;

    #[test]
    fn fired_timer_is_delivered_to_registered_task() {
        let backend = Arc::new(HeapTimerBackend::new());
        let dispatcher = Arc::new(TimerDispatcher::new());

        let task = TaskId::new(7);
        let (tx, rx) = channel::channel(8);
        dispatcher.register(task, tx);

        backend.insert(TimerEntry::after(task, Duration::from_millis(5), TimerKind::T200));

        let handle = spawn_timer_thread(backend, dispatcher, TimerThreadConfig::default());
        let fired = rx.recv_timeout(Duration::from_millis(500)).expect("timer should fire");
        assert_eq!(fired.task, task);
        assert!(matches!(fired.kind, TimerKind::T200));

        handle.shutdown();
    }

    #[test]
    fn firing_for_unregistered_task_is_dropped_silently() {
        let backend = Arc::new(HeapTimerBackend::new());
        let dispatcher = Arc::new(TimerDispatcher::new());

        backend.insert(TimerEntry::after(TaskId::new(99), Duration::from_millis(5), TimerKind::T200));

        let handle = spawn_timer_thread(backend, dispatcher, TimerThreadConfig::default());
        thread::sleep(Duration::from_millis(50));
        handle.shutdown();
    }
}
