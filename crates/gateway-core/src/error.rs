//! Low-level error types for the concurrency primitives in this crate.
//!
//! Components above this layer convert these into `gerror::GError` at their
//! public boundary, attaching the domain-specific `GlobalId` codes.

use core::fmt;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// A `CancellationToken` was tripped while waiting.
    Cancelled,
    /// An explicit deadline elapsed before the operation completed.
    Timeout,
    /// The channel's peer has been dropped.
    ChannelClosed,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Cancelled => write!(f, "operation cancelled"),
            CoreError::Timeout => write!(f, "operation timed out"),
            CoreError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Returned by `Sender::try_send` when the bounded channel is full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrySendError<T>(pub T);

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel full")
    }
}

/// Returned by `Receiver::try_recv` when the bounded channel is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryRecvError;

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel empty")
    }
}
