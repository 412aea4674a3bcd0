//! Cancellation token for cooperative cancellation.
//!
//! Dropping a call reference implicitly cancels its timers: each
//! T301/T303/T305/T308/T310 timer a call owns carries a child token of
//! the call's token, so cancelling the call
//! cancels every outstanding timer for it in one call.

use crate::error::{CoreError, CoreResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct CancellationToken {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    Owned(Arc<OwnedCancellation>),
    /// Never cancels; used where a token parameter is required but
    /// cancellation is not meaningful (e.g. infrastructure self-tests).
    Dummy,
}

struct OwnedCancellation {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Inner::Owned(Arc::new(OwnedCancellation {
                cancelled: AtomicBool::new(false),
                parent: None,
            })),
        }
    }

    pub fn dummy() -> Self {
        Self { inner: Inner::Dummy }
    }

    /// Create a child token: cancelling `self` cancels the child, but not
    /// the reverse.
    pub fn child(&self) -> Self {
        Self {
            inner: Inner::Owned(Arc::new(OwnedCancellation {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            })),
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match &self.inner {
            Inner::Owned(arc) => {
                if arc.cancelled.load(Ordering::Acquire) {
                    return true;
                }
                match &arc.parent {
                    Some(parent) => parent.is_cancelled(),
                    None => false,
                }
            }
            Inner::Dummy => false,
        }
    }

    pub fn cancel(&self) {
        if let Inner::Owned(arc) = &self.inner {
            arc.cancelled.store(true, Ordering::Release);
        }
    }

    #[inline]
    pub fn check(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_cancellation() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(CoreError::Cancelled)));
    }

    #[test]
    fn child_sees_parent_cancel() {
        let parent = CancellationToken::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn child_cancel_does_not_propagate_up() {
        let parent = CancellationToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn dummy_never_cancels() {
        let token = CancellationToken::dummy();
        token.cancel();
        assert!(!token.is_cancelled());
    }
}
