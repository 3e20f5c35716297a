//! Debounced auto-save
//!
//! Each edit resets a single trailing-edge timer; when it fires, the save
//! closure runs against the editor content as it is at fire time, never a
//! stale snapshot. Failures inside the closure are its own concern (logged,
//! never propagated).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Trailing-edge debounce window for auto-save
pub const AUTO_SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

/// Debounced auto-save timer with a single in-flight task
pub struct AutoSaver {
    save: Arc<dyn Fn() + Send + Sync>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl AutoSaver {
    /// `save` is invoked on the runtime after the debounce window elapses
    /// with no further edits
    pub fn new(save: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            save: Arc::new(save),
            pending: Mutex::new(None),
        }
    }

    /// Note an edit: reset the timer so the save fires only after the
    /// debounce window of quiet
    pub fn note_edit(&self) {
        let Ok(mut pending) = self.pending.lock() else { return };

        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let save = self.save.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(AUTO_SAVE_DEBOUNCE).await;
            save();
        }));
    }

    /// Cancel any pending save
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}
