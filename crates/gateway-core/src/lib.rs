//! # gateway-core
//!
//! Concurrency primitives shared by every component of the signaling
//! gateway: LAPD engines, Q.931 call-control instances, ISUP CIC
//! state machines, the NFAS group supervisor, the protocol translator,
//! the session registry, and the RTP port pool.
//!
//! Adapted from a green-thread scheduler's support crate. The id pool,
//! spinlock, channel, and cancellation token carry over with their
//! concurrency behavior generalized from "green thread on N workers" to
//! "one task per OS thread"; the slot allocator, ready-queue bitmap
//! metadata layout, and platform/arch traits are scheduler-internal and
//! have no counterpart here.
//!
//! ## Modules
//!
//! - `id` - task identifier type
//! - `idpool` - deterministic lowest-id-first bitmap allocator
//! - `channel` - bounded MPMC channel used for every task's queue
//! - `cancel` - cancellation token for cooperative cancellation
//! - `error` - low-level error types for this crate
//! - `spinlock` - internal spinlock for short critical sections
//! - `diag` - leveled diagnostic print macros
//! - `env` - environment variable utilities

#![allow(dead_code)]

pub mod cancel;
pub mod channel;
pub mod diag;
pub mod env;
pub mod error;
pub mod id;
pub mod idpool;
pub mod spinlock;

pub use cancel::CancellationToken;
pub use channel::{channel, Receiver, Sender};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};
pub use error::{CoreError, CoreResult};
pub use id::TaskId;
pub use idpool::IdPool;
pub use spinlock::SpinLock;
