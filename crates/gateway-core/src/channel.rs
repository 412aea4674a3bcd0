//! Bounded MPMC channel used for every task's command/event queue.
//!
//! Every LAPD engine, NFAS group supervisor, and the translator/session
//! ingress task is driven by one of these: frames, commands, and timer
//! firings are all pushed onto the same queue and processed in arrival
//! order, processed in order with ordinary messages and never
//! preemptively. Unlike the scheduler-integrated channel this was
//! adapted from (which spun waiting for a user-level scheduler to mark a
//! waiter ready), tasks here are plain OS threads, so waiting is a real
//! `Condvar` park rather than a spin-yield placeholder.

use crate::error::{CoreError, CoreResult, TryRecvError, TrySendError};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(ChannelInner {
        state: Mutex::new(State {
            buffer: VecDeque::with_capacity(capacity),
            closed: false,
            sender_count: 1,
            receiver_count: 1,
        }),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
        capacity,
    });
    (
        Sender {
            inner: Arc::clone(&inner),
        },
        Receiver { inner },
    )
}

struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
    sender_count: usize,
    receiver_count: usize,
}

struct ChannelInner<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

pub struct Sender<T> {
    inner: Arc<ChannelInner<T>>,
}

pub struct Receiver<T> {
    inner: Arc<ChannelInner<T>>,
}

impl<T> Sender<T> {
    /// Send a value, blocking the calling thread while the buffer is full.
    pub fn send(&self, value: T) -> CoreResult<()> {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if state.closed {
                return Err(CoreError::ChannelClosed);
            }
            if state.buffer.len() < self.inner.capacity {
                state.buffer.push_back(value);
                self.inner.not_empty.notify_one();
                return Ok(());
            }
            state = self.inner.not_full.wait(state).unwrap();
        }
    }

    /// Send without blocking; fails immediately if the buffer is full.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let mut state = self.inner.state.lock().unwrap();
        if state.closed || state.buffer.len() >= self.inner.capacity {
            return Err(TrySendError(value));
        }
        state.buffer.push_back(value);
        drop(state);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Push a value, dropping the oldest buffered value if full instead of
    /// blocking. Returns the dropped value, if any. Used by the NFAS group's
    /// bounded switchover queue, where oldest messages are dropped on
    /// overflow.
    pub fn push_overwriting(&self, value: T) -> Option<T> {
        let mut state = self.inner.state.lock().unwrap();
        let dropped = if state.buffer.len() >= self.inner.capacity {
            state.buffer.pop_front()
        } else {
            None
        };
        state.buffer.push_back(value);
        drop(state);
        self.inner.not_empty.notify_one();
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().unwrap().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().unwrap().buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl<T> Receiver<T> {
    /// Receive a value, blocking while the buffer is empty.
    pub fn recv(&self) -> CoreResult<T> {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if let Some(value) = state.buffer.pop_front() {
                drop(state);
                self.inner.not_full.notify_one();
                return Ok(value);
            }
            if state.sender_count == 0 {
                return Err(CoreError::ChannelClosed);
            }
            state = self.inner.not_empty.wait(state).unwrap();
        }
    }

    /// Receive with a deadline; returns `Timeout` if nothing arrives in time.
    pub fn recv_timeout(&self, timeout: Duration) -> CoreResult<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if let Some(value) = state.buffer.pop_front() {
                drop(state);
                self.inner.not_full.notify_one();
                return Ok(value);
            }
            if state.sender_count == 0 {
                return Err(CoreError::ChannelClosed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(CoreError::Timeout);
            }
            let (next_state, result) =
                self.inner.not_empty.wait_timeout(state, deadline - now).unwrap();
            state = next_state;
            if result.timed_out() && state.buffer.is_empty() {
                return Err(CoreError::Timeout);
            }
        }
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut state = self.inner.state.lock().unwrap();
        match state.buffer.pop_front() {
            Some(v) => {
                drop(state);
                self.inner.not_full.notify_one();
                Ok(v)
            }
            None => Err(TryRecvError),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().unwrap().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().unwrap().buffer.is_empty()
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.inner.state.lock().unwrap().sender_count += 1;
        Sender {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().unwrap();
        state.sender_count -= 1;
        if state.sender_count == 0 {
            state.closed = true;
            drop(state);
            self.inner.not_empty.notify_all();
        }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.inner.state.lock().unwrap().receiver_count += 1;
        Receiver {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().unwrap();
        state.receiver_count -= 1;
        if state.receiver_count == 0 {
            state.closed = true;
            drop(state);
            self.inner.not_full.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_send_recv() {
        let (tx, rx) = channel(10);
        tx.try_send(42).unwrap();
        assert_eq!(rx.try_recv().unwrap(), 42);
    }

    #[test]
    fn fifo_order() {
        let (tx, rx) = channel(10);
        for i in 0..5 {
            tx.try_send(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.try_recv().unwrap(), i);
        }
    }

    #[test]
    fn buffer_full_then_drains() {
        let (tx, rx) = channel(2);
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        assert!(tx.try_send(3).is_err());
        rx.try_recv().unwrap();
        tx.try_send(3).unwrap();
    }

    #[test]
    fn push_overwriting_drops_oldest() {
        let (tx, rx) = channel(2);
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        let dropped = tx.push_overwriting(3);
        assert_eq!(dropped, Some(1));
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert_eq!(rx.try_recv().unwrap(), 3);
    }

    #[test]
    fn sender_drop_closes_after_drain() {
        let (tx, rx) = channel::<i32>(10);
        tx.try_send(1).unwrap();
        drop(tx);
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert!(matches!(rx.try_recv(), Err(TryRecvError)));
        assert!(rx.is_closed());
    }

    #[test]
    fn blocking_recv_wakes_on_send() {
        let (tx, rx) = channel::<i32>(1);
        let t = std::thread::spawn(move || rx.recv().unwrap());
        std::thread::sleep(Duration::from_millis(10));
        tx.send(99).unwrap();
        assert_eq!(t.join().unwrap(), 99);
    }

    #[test]
    fn recv_timeout_expires() {
        let (_tx, rx) = channel::<i32>(1);
        let result = rx.recv_timeout(Duration::from_millis(20));
        assert!(matches!(result, Err(CoreError::Timeout)));
    }
}
