//! Supervisor that wires LAPD/NFAS, Q.931, ISUP, the protocol translator,
//! the session registry, and the RTP port pool against a transport
//! boundary .
//!
//! Every protocol crate below this one (`lapd`, `q931`, `isup`, `nfas`,
//! `xlat`, `session`, `rtp`) is a pure state machine with no I/O of its
//! own; [`supervisor::Gateway`] is the one place octets cross a wire,
//! drains a timer, or sends a SIP message, and the one place this
//! workspace's `diag` logging macros actually fire.

#![allow(dead_code)]

pub mod config;
pub mod line;
pub mod supervisor;
pub mod transport;

pub use config::GatewayConfig;
pub use supervisor::Gateway;
pub use transport::{InMemorySipTransport, InMemoryTdmTransport, SipTransport, TdmTransport, TransportError};
