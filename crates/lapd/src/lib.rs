//! LAPD (ITU-T Q.921) frame codec and per-D-channel data-link state machine.
//!
//! [`frame`] encodes/decodes octets on the wire. [`engine`] drives the
//! `DOWN`/`AWAITING_ESTAB`/`ESTABLISHED` state machine as a pure function
//! from input to a list of [`event::LapdAction`]s; it owns no transport and
//! performs no I/O itself.

#![allow(dead_code)]

pub mod config;
pub mod engine;
pub mod event;
pub mod frame;

pub use config::LapdConfig;
pub use engine::{LapdEngine, LinkState};
pub use event::{LapdAction, LapdErrorKind, LapdEvent, SendError};
pub use frame::{Address, Control, Frame, FrameError, SupervisoryKind, UnnumberedKind};
