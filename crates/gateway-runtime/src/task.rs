//! One-OS-thread-per-component task model.
//!
//! Adapted from the fixed-size worker pool this runtime's scheduler used
//! to run green threads: here each "worker" is a single, dynamically
//! spawned task — one LAPD engine, one NFAS group supervisor, one
//! translator/session ingress instance — rather than one of N preallocated
//! threads pulling work from a shared ready queue. `TaskSupervisor` tracks
//! join handles and hands out `TaskId`s; it does not schedule anything.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use gateway_core::cancel::CancellationToken;
use gateway_core::id::TaskId;

/// Supervises the lifetime of every spawned task thread.
pub struct TaskSupervisor {
    handles: Mutex<Vec<(TaskId, JoinHandle<()>)>>,
    next_id: AtomicU32,
    stack_size: usize,
}

impl TaskSupervisor {
    pub fn new(stack_size: usize) -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(0),
            stack_size,
        }
    }

    /// Allocate a `TaskId` without spawning a thread for it. Useful when the
    /// id is needed to build the task's own startup state (e.g. its timer
    /// channel registration) before the thread body runs.
    pub fn reserve_id(&self) -> TaskId {
        TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Spawn a task thread tagged `name` (used for both the OS thread name
    /// and the diagnostic component tag), running under `cancel`.
    ///
    /// `body` receives the token and is expected to check
    /// `cancel.is_cancelled()` at its natural yield points (after each
    /// `recv_timeout`, typically) and return promptly once cancelled.
    pub fn spawn<F>(&self, id: TaskId, name: &'static str, cancel: CancellationToken, body: F) -> TaskId
    where
        F: FnOnce(TaskId, CancellationToken) + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("{}-{}", name, id.as_u32()))
            .stack_size(self.stack_size)
            .spawn(move || {
                gateway_core::diag::set_component(name);
                body(id, cancel);
                gateway_core::diag::clear_component();
            })
            .expect("failed to spawn task thread");

        self.handles.lock().unwrap().push((id, handle));
        id
    }

    /// Join every still-tracked task. Tasks that have already been joined
    /// (e.g. via `join_one`) are skipped.
    pub fn join_all(&self) {
        let mut handles = self.handles.lock().unwrap();
        for (_, handle) in handles.drain(..) {
            let _ = handle.join();
        }
    }

    /// Join and remove a single task by id, if tracked.
    pub fn join_one(&self, id: TaskId) {
        let mut handles = self.handles.lock().unwrap();
        if let Some(pos) = handles.iter().position(|(t, _)| *t == id) {
            let (_, handle) = handles.remove(pos);
            let _ = handle.join();
        }
    }

    pub fn task_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn spawned_task_runs_and_joins() {
        let supervisor = TaskSupervisor::new(256 * 1024);
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        let id = supervisor.reserve_id();
        supervisor.spawn(id, "test-task", CancellationToken::new(), move |_id, _cancel| {
            ran_clone.store(true, Ordering::SeqCst);
        });

        supervisor.join_all();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn cancellation_is_observable_inside_task() {
        let supervisor = TaskSupervisor::new(256 * 1024);
        let cancel = CancellationToken::new();
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let saw_cancel_clone = saw_cancel.clone();

        let id = supervisor.reserve_id();
        let cancel_for_task = cancel.clone();
        supervisor.spawn(id, "test-task", cancel_for_task, move |_id, cancel| {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            saw_cancel_clone.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        supervisor.join_all();

        assert!(saw_cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn task_count_reflects_unjoined_tasks() {
        let supervisor = TaskSupervisor::new(256 * 1024);
        let id1 = supervisor.reserve_id();
        let id2 = supervisor.reserve_id();
        supervisor.spawn(id1, "test-task", CancellationToken::new(), |_, _| {});
        supervisor.spawn(id2, "test-task", CancellationToken::new(), |_, _| {});

        thread::sleep(Duration::from_millis(20));
        assert_eq!(supervisor.task_count(), 2);

        supervisor.join_one(id1);
        assert_eq!(supervisor.task_count(), 1);

        supervisor.join_all();
        assert_eq!(supervisor.task_count(), 0);
    }
}
