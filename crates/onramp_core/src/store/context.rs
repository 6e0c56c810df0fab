//! Caller-supplied cancellation and deadline signal.

use crate::store::status::{StatusCode, StoreError, StoreResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation flag plus optional deadline, passed into every store call.
///
/// Clones share the flag: cancelling any clone cancels all of them, which lets
/// another thread abort a call that is still running.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the terminal status of this context, if it is done.
    ///
    /// Cancellation wins over an expired deadline.
    pub fn status(&self) -> Option<StatusCode> {
        if self.is_cancelled() {
            return Some(StatusCode::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StatusCode::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status().is_some()
    }

    pub(crate) fn check(&self) -> StoreResult<()> {
        match self.status() {
            Some(StatusCode::Cancelled) => {
                Err(StoreError::new(StatusCode::Cancelled, "call was cancelled"))
            }
            Some(code) => Err(StoreError::new(code, "call deadline exceeded")),
            None => Ok(()),
        }
    }
}
