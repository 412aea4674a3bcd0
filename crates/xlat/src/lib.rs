//! Protocol translator: stateless, per-call mapping between Q.931,
//! ISUP, and SIP.
//!
//! [`tables`] holds the immutable (overridable) per-variant cause and
//! progress-indicator tables. [`translator`] is the pure mapping layer;
//! [`context`] carries the identifiers and fixed variant one call's
//! translations share. [`sip`] is the minimal SIP request/response shape
//! the core produces for its SIP collaborator.

#![allow(dead_code)]

pub mod context;
pub mod sip;
pub mod tables;
pub mod translator;
pub mod variant;

pub use context::TranslationContext;
pub use sip::{SdpOffer, SipMessage};
pub use tables::RuleSet;
pub use translator::{isup_event_to_sip, isup_iam_to_invite, q931_event_to_sip, sip_status_to_cause};
pub use variant::Variant;
