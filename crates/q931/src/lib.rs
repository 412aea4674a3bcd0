//! Q.931 message codec and per-call-reference call-control state machine.
//!
//! [`message`] encodes/decodes octets on the wire, tolerant of and
//! preserving unknown information elements. [`call`] drives one call's
//! state machine as a pure function from input to a list of
//! [`event::CallControlAction`]s. [`table`] owns every call reference on
//! one D-channel endpoint and enforces at most one active SM per call
//! reference.

#![allow(dead_code)]

pub mod call;
pub mod config;
pub mod event;
pub mod message;
pub mod table;

pub use call::{CallControlSm, CallState};
pub use config::CallControlConfig;
pub use event::{cause, CallControlAction, CallControlEvent, OriginatingSide};
pub use message::{CallReference, Ie, Message, MessageType, Q931Error};
pub use table::CallTable;
