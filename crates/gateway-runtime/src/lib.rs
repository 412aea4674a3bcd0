//! # gateway-runtime
//!
//! The runtime layer above `gateway-core`: task spawning, the timer
//! subsystem, and process-wide configuration.
//!
//! Adapted from a green-thread scheduler's platform runtime. The
//! preemption/sleep timer backend and its worker thread carry over almost
//! unchanged, generalized from waking green threads on a ready queue to
//! delivering named protocol timers (T200, T303, the NFAS heartbeat, ...)
//! into the owning task's own channel. The memory/signal/arch/tls/parking
//! modules of the original runtime were specific to stackful-coroutine
//! context switching and have no counterpart here — every task in this
//! crate is a plain OS thread.

#![allow(dead_code)]

pub mod config;
pub mod task;
pub mod timer;

pub use config::RuntimeConfig;
pub use task::TaskSupervisor;
pub use timer::{TimerBackend, TimerDispatcher, TimerEntry, TimerHandle, TimerKind, TimerRegistry};
