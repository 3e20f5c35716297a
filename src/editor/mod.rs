//! Editor surfaces and the content-synchronization guard

pub mod surface;
pub mod sync_guard;

pub use surface::{
    text_to_html, EditorSurface, SharedSurface, EVALUATION_PLACEHOLDER, LOADING_MARKER,
    PROSE_PLACEHOLDER,
};
pub use sync_guard::{classify, ContentChange, ContentSyncGuard};
