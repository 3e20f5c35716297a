//! Content synchronization guard
//!
//! The prose surface is externally mutable, and a destructive reset must not
//! silently discard generated prose. This guard keeps a protected snapshot of
//! the last committed content and restores it when the surface is reset,
//! while letting appends and deliberate edits through. It is a best-effort
//! heuristic, not a transactional log: a failed or skipped restoration is
//! logged, never raised.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::util::truncate_chars;

use super::surface::{strip_tags, SharedSurface};

/// A reset is suspected when the plain text drops below this length...
pub const RESET_TEXT_THRESHOLD: usize = 50;

/// ...while the protected snapshot exceeds this length. Also the bar a
/// non-append edit must clear before the guard trusts it.
pub const SUBSTANTIAL_LENGTH_THRESHOLD: usize = 100;

/// At most one restoration per rolling window
pub const RESTORE_THROTTLE: Duration = Duration::from_secs(1);

/// Consecutive restorations before the guard pauses itself
pub const MAX_CONSECUTIVE_RESTORES: u32 = 5;

/// How long the guard pauses after too many restorations
pub const RESTORE_PAUSE: Duration = Duration::from_secs(5);

/// Interval of the background re-validation check
pub const WATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Settle delay after an intentional clear before protection resumes
pub const CLEAR_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Marker identifying an inline error rendering; never protected
const ERROR_MARKER: &str = "<div class=\"error\">";

/// Classification of a change to the observed surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentChange {
    /// Content was destructively reset; restore the snapshot
    Reset,
    /// Legitimate growth (one side contains the other); adopt the new content
    Append,
    /// Large deliberate edit; adopt the new content
    SubstantialEdit,
    /// Small change; leave everything alone
    Minor,
}

/// Classify a change from the protected snapshot to the current content.
/// Pure so the heuristic can be tested without a live surface.
pub fn classify(protected: &str, current: &str, placeholder: &str) -> ContentChange {
    let current_text = strip_tags(current);

    let is_reset = current == placeholder
        || current.trim().is_empty()
        || (current_text.len() < RESET_TEXT_THRESHOLD
            && protected.len() > SUBSTANTIAL_LENGTH_THRESHOLD);

    if is_reset {
        return ContentChange::Reset;
    }

    if current.contains(protected) || protected.contains(current) {
        return ContentChange::Append;
    }

    if current != protected && current.len() > SUBSTANTIAL_LENGTH_THRESHOLD {
        return ContentChange::SubstantialEdit;
    }

    ContentChange::Minor
}

#[derive(Debug, Default)]
struct GuardState {
    protected: Option<String>,
    restore_count: u32,
    last_restore: Option<Instant>,
    paused_until: Option<Instant>,
}

/// Guard watching one editor surface for destructive resets
pub struct ContentSyncGuard {
    surface: SharedSurface,
    placeholder: &'static str,
    state: Mutex<GuardState>,
    intentional_clear: AtomicBool,
    disabled: AtomicBool,
    watch_token: Mutex<Option<CancellationToken>>,
}

impl ContentSyncGuard {
    pub fn new(surface: SharedSurface) -> Self {
        let placeholder = surface
            .lock()
            .map(|s| s.placeholder())
            .unwrap_or_default();

        Self {
            surface,
            placeholder,
            state: Mutex::new(GuardState::default()),
            intentional_clear: AtomicBool::new(false),
            disabled: AtomicBool::new(false),
            watch_token: Mutex::new(None),
        }
    }

    /// Record `content` as the protected snapshot. Placeholders, error
    /// renderings and empty content are never protected.
    pub fn arm(&self, content: &str) {
        if self.disabled.load(Ordering::SeqCst) {
            return;
        }
        if self.intentional_clear.load(Ordering::SeqCst) {
            log::debug!("Not arming protection during intentional clear");
            return;
        }
        if content == self.placeholder || content.trim().is_empty() {
            log::debug!("Not protecting default/empty content");
            return;
        }
        if content.contains(ERROR_MARKER) {
            log::debug!("Not protecting error message content");
            return;
        }

        let Ok(mut state) = self.state.lock() else { return };
        state.protected = Some(content.to_string());
        state.restore_count = 0;
        log::debug!("Protecting content: {}...", truncate_chars(content, 50));
    }

    /// Start the background re-validation loop. A previous loop, if any, is
    /// cancelled first.
    pub fn start_watch(self: &std::sync::Arc<Self>) {
        let token = CancellationToken::new();
        {
            let Ok(mut slot) = self.watch_token.lock() else { return };
            if let Some(previous) = slot.take() {
                previous.cancel();
            }
            *slot = Some(token.clone());
        }

        let guard = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(WATCH_INTERVAL);
            interval.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => guard.review(),
                }
            }
        });
    }

    /// Compare the surface against the protected snapshot and act on the
    /// classification. Called after mutations and from the watch loop.
    pub fn review(&self) {
        if self.disabled.load(Ordering::SeqCst)
            || self.intentional_clear.load(Ordering::SeqCst)
        {
            return;
        }

        let current = {
            let Ok(surface) = self.surface.lock() else { return };
            surface.content().to_string()
        };

        let Ok(mut state) = self.state.lock() else { return };
        let Some(protected) = state.protected.clone() else { return };

        if current == protected {
            return;
        }

        match classify(&protected, &current, self.placeholder) {
            ContentChange::Reset => {
                log::debug!("Content reset detected");
                self.try_restore(&mut state, &protected);
            }
            ContentChange::Append => {
                state.protected = Some(current);
                state.restore_count = 0;
                log::debug!("Detected append, updated protected content");
            }
            ContentChange::SubstantialEdit => {
                state.protected = Some(current);
                state.restore_count = 0;
                log::debug!("Updated protected content due to substantial change");
            }
            ContentChange::Minor => {}
        }
    }

    /// Restore the snapshot into the surface, subject to throttling
    fn try_restore(&self, state: &mut GuardState, protected: &str) {
        let now = Instant::now();

        if let Some(until) = state.paused_until {
            if now < until {
                log::debug!("Protection paused, skipping restoration");
                return;
            }
            state.paused_until = None;
            state.restore_count = 0;
        }

        if let Some(last) = state.last_restore {
            if now.duration_since(last) < RESTORE_THROTTLE {
                log::debug!("Throttling restoration");
                return;
            }
        }

        state.last_restore = Some(now);
        state.restore_count += 1;
        log::info!("Restoring content (count: {})", state.restore_count);

        if let Ok(mut surface) = self.surface.lock() {
            surface.set_content(protected);
        } else {
            log::warn!("Could not lock surface for restoration, skipping");
        }

        if state.restore_count >= MAX_CONSECUTIVE_RESTORES {
            log::warn!("Too many consecutive restorations, pausing protection");
            state.paused_until = Some(now + RESTORE_PAUSE);
            state.restore_count = 0;
        }
    }

    /// Run an explicit clear without triggering restoration. The suppression
    /// flag stays raised for a settle delay after the action completes, and
    /// the snapshot is dropped since its content was legitimately cleared.
    pub async fn suppress_during<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.intentional_clear.store(true, Ordering::SeqCst);
        action().await;

        if let Ok(mut state) = self.state.lock() {
            state.protected = None;
            state.restore_count = 0;
        }

        tokio::time::sleep(CLEAR_SETTLE_DELAY).await;
        self.intentional_clear.store(false, Ordering::SeqCst);
    }

    /// Emergency escape hatch: permanently stop observation. Idempotent.
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);

        if let Ok(mut slot) = self.watch_token.lock() {
            if let Some(token) = slot.take() {
                token.cancel();
            }
        }
        if let Ok(mut state) = self.state.lock() {
            *state = GuardState::default();
        }

        log::info!("Content protection disabled");
    }

    /// The currently protected snapshot, if any
    pub fn protected_content(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.protected.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::surface::{EditorSurface, PROSE_PLACEHOLDER};
    use tokio::time::{advance, Duration};

    const LONG_CONTENT: &str =
        "<p>It was a dark and stormy night; the rain fell in torrents, except at \
         occasional intervals, when it was checked by a violent gust of wind.</p>";

    fn armed_guard() -> (ContentSyncGuard, SharedSurface) {
        let surface = EditorSurface::prose();
        surface.lock().unwrap().set_content(LONG_CONTENT);
        let guard = ContentSyncGuard::new(surface.clone());
        guard.arm(LONG_CONTENT);
        (guard, surface)
    }

    #[test]
    fn test_classify_reset() {
        assert_eq!(
            classify(LONG_CONTENT, "", PROSE_PLACEHOLDER),
            ContentChange::Reset
        );
        assert_eq!(
            classify(LONG_CONTENT, PROSE_PLACEHOLDER, PROSE_PLACEHOLDER),
            ContentChange::Reset
        );
        assert_eq!(
            classify(LONG_CONTENT, "<p>short</p>", PROSE_PLACEHOLDER),
            ContentChange::Reset
        );
    }

    #[test]
    fn test_classify_append() {
        let appended = format!("{}<p>And then it stopped.</p>", LONG_CONTENT);
        assert_eq!(
            classify(LONG_CONTENT, &appended, PROSE_PLACEHOLDER),
            ContentChange::Append
        );
    }

    #[test]
    fn test_classify_substantial_edit() {
        let rewrite = "<p>An entirely different paragraph, long enough that the \
                       guard trusts it as a deliberate rewrite of the prose.</p>";
        assert_eq!(
            classify(LONG_CONTENT, rewrite, PROSE_PLACEHOLDER),
            ContentChange::SubstantialEdit
        );
    }

    #[test]
    fn test_classify_minor() {
        assert_eq!(
            classify("<p>short prose</p>", "<p>short prosa</p>", PROSE_PLACEHOLDER),
            ContentChange::Minor
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_is_restored_once() {
        let (guard, surface) = armed_guard();

        surface.lock().unwrap().set_content("");
        guard.review();
        assert_eq!(surface.lock().unwrap().content(), LONG_CONTENT);

        // A second reset within the throttle window is not restored
        advance(Duration::from_millis(500)).await;
        surface.lock().unwrap().set_content(PROSE_PLACEHOLDER);
        guard.review();
        assert_eq!(surface.lock().unwrap().content(), PROSE_PLACEHOLDER);
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_updates_snapshot_without_restore() {
        let (guard, surface) = armed_guard();

        let appended = format!("{}<p>extra</p>", LONG_CONTENT);
        surface.lock().unwrap().set_content(appended.clone());
        guard.review();

        assert_eq!(surface.lock().unwrap().content(), appended);
        assert_eq!(guard.protected_content().as_deref(), Some(appended.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_after_consecutive_restores() {
        let (guard, surface) = armed_guard();

        // Five resets spaced just outside the throttle window all restore
        for _ in 0..5 {
            surface.lock().unwrap().set_content("");
            guard.review();
            assert_eq!(surface.lock().unwrap().content(), LONG_CONTENT);
            advance(Duration::from_secs(1)).await;
        }

        // The sixth hits the pause
        surface.lock().unwrap().set_content("");
        guard.review();
        assert_eq!(surface.lock().unwrap().content(), "");

        // After the pause expires, protection resumes
        advance(RESTORE_PAUSE).await;
        guard.review();
        assert_eq!(surface.lock().unwrap().content(), LONG_CONTENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppress_during_allows_clear() {
        let (guard, surface) = armed_guard();

        let cleared = surface.clone();
        guard
            .suppress_during(|| async move {
                cleared.lock().unwrap().reset();
            })
            .await;

        guard.review();
        assert_eq!(surface.lock().unwrap().content(), PROSE_PLACEHOLDER);
        assert!(guard.protected_content().is_none());
    }

    #[test]
    fn test_arm_accepts_multibyte_content() {
        let surface = EditorSurface::prose();
        let guard = ContentSyncGuard::new(surface);

        // The 50th character is multi-byte; arming must not choke on it
        let content = format!("{}é and the café stayed open past midnight", "a".repeat(49));
        guard.arm(&content);
        assert_eq!(guard.protected_content().as_deref(), Some(content.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_placeholder_and_errors_never_armed() {
        let surface = EditorSurface::prose();
        let guard = ContentSyncGuard::new(surface.clone());

        guard.arm(PROSE_PLACEHOLDER);
        assert!(guard.protected_content().is_none());

        guard.arm("   ");
        assert!(guard.protected_content().is_none());

        guard.arm("<div class=\"error\">Error: boom</div>");
        assert!(guard.protected_content().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_is_idempotent_and_stops_restores() {
        let (guard, surface) = armed_guard();

        guard.disable();
        guard.disable();

        surface.lock().unwrap().set_content("");
        guard.review();
        assert_eq!(surface.lock().unwrap().content(), "");
    }
}
