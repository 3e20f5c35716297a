//! Generation session state
//!
//! One busy flag serializes all generation work: a second request while one
//! is in flight is rejected immediately rather than queued. The flag is held
//! through an RAII guard so it cannot leak on an early return.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tracks whether a generation (prompt or evaluation) is in flight
#[derive(Debug, Default)]
pub struct GenerationSession {
    busy: AtomicBool,
}

impl GenerationSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether a generation is currently in flight
    pub fn is_generating(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Claim the busy flag. Returns None when a generation is already in
    /// flight; the returned guard releases the flag on drop.
    pub fn try_begin(self: &Arc<Self>) -> Option<GenerationGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;

        Some(GenerationGuard {
            session: self.clone(),
        })
    }
}

/// RAII guard marking a generation in flight
pub struct GenerationGuard {
    session: Arc<GenerationSession>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.session.busy.store(false, Ordering::SeqCst);
    }
}
