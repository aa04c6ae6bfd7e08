//! Cancellation handling for in-flight drive runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag the caller trips to abandon a run.
///
/// The engine polls it between questions and before every persistence
/// write; a tripped flag abandons in-flight scoring and leaves the drive
/// report `pending` for the next run to overwrite.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Reset the flag (for testing or re-use).
    pub fn reset(&self) {
        self.inner.store(false, Ordering::SeqCst);
    }
}
