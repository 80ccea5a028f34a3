//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag, consulted by the orchestrator between
/// groups. Clones share state; tripping any clone trips them all.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    tripped: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.tripped.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}
