//! Coarse-grained cancellation for long-running compressions.
//!
//! A compression is a sequence of full-document builds. The search controller
//! checks the flag before starting each build; a build already in flight always
//! runs to completion. Clone the flag, hand one copy to
//! [`crate::config::CompressionConfigBuilder::cancellation`] and keep the
//! other to call [`CancellationFlag::cancel`] from a signal handler or a
//! timeout task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, cloneable cancellation flag. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}
