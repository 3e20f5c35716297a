//! Editor surfaces
//!
//! In-process stand-ins for the two rich-text panes (prose and evaluation).
//! A surface holds a serialized HTML fragment (or plain text) and exposes a
//! plain-text projection and a word count. The UI layer renders and mutates
//! these through the `App` operations.

use std::sync::{Arc, Mutex};

/// Default text shown in the prose pane before anything is generated
pub const PROSE_PLACEHOLDER: &str = "Response will appear here...";

/// Default text shown in the evaluation pane
pub const EVALUATION_PLACEHOLDER: &str =
    "Story evaluation will appear here after clicking 'Evaluate Story'...";

/// Marker text rendered while a generation is in flight
pub const LOADING_MARKER: &str = "Loading...";

/// Separator inserted between an existing response and an appended one
pub const RESPONSE_SEPARATOR: &str = "<div class=\"response-separator\"></div>";

/// Loading placeholder fragment, targeted for replacement when the
/// generation completes so surrounding content is not disturbed
pub const LOADING_PLACEHOLDER: &str = "<div id=\"loading-placeholder\">Loading...</div>";

/// A rich-text-capable editing surface
#[derive(Debug)]
pub struct EditorSurface {
    placeholder: &'static str,
    html: String,
}

/// Shared handle to a surface, touched by the app, the sync guard and the
/// auto-save timer
pub type SharedSurface = Arc<Mutex<EditorSurface>>;

impl EditorSurface {
    pub fn new(placeholder: &'static str) -> Self {
        Self {
            placeholder,
            html: placeholder.to_string(),
        }
    }

    /// The prose pane
    pub fn prose() -> SharedSurface {
        Arc::new(Mutex::new(Self::new(PROSE_PLACEHOLDER)))
    }

    /// The evaluation pane
    pub fn evaluation() -> SharedSurface {
        Arc::new(Mutex::new(Self::new(EVALUATION_PLACEHOLDER)))
    }

    pub fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    /// The serialized content as stored (HTML fragment or plain text)
    pub fn content(&self) -> &str {
        &self.html
    }

    pub fn set_content(&mut self, html: impl Into<String>) {
        self.html = html.into();
    }

    /// Reset the surface to its placeholder text
    pub fn reset(&mut self) {
        self.html = self.placeholder.to_string();
    }

    /// Plain-text projection of the content (tags stripped)
    pub fn plain_text(&self) -> String {
        strip_tags(&self.html)
    }

    /// Word count of the plain-text projection
    pub fn word_count(&self) -> usize {
        count_words(&self.plain_text())
    }

    pub fn is_placeholder(&self) -> bool {
        self.html == self.placeholder
    }

    /// Whether the surface holds user-visible content worth keeping
    /// (not the placeholder, not empty, not a pending loading marker)
    pub fn has_real_content(&self) -> bool {
        !self.is_placeholder()
            && !self.html.trim().is_empty()
            && !self.html.contains(LOADING_MARKER)
    }

    /// Load project content into the surface, auto-detecting HTML vs plain
    /// text. Empty content resets to the placeholder.
    pub fn load(&mut self, content: &str) {
        if content.trim().is_empty() {
            self.reset();
        } else if looks_like_html(content) {
            self.html = content.to_string();
        } else {
            self.html = text_to_html(content);
        }
    }

    /// Show the loading placeholder ahead of a generation. Existing content
    /// is kept and the placeholder appended after a separator; placeholder
    /// or empty content is replaced outright. Returns true when appended.
    pub fn begin_loading(&mut self) -> bool {
        if self.has_real_content() {
            self.html.push_str(RESPONSE_SEPARATOR);
            self.html.push_str(LOADING_PLACEHOLDER);
            true
        } else {
            self.html = LOADING_PLACEHOLDER.to_string();
            false
        }
    }

    /// Commit generated (or error) content, specifically replacing the
    /// loading placeholder so unrelated content is not disturbed
    pub fn commit(&mut self, html: &str) {
        if let Some(pos) = self.html.find(LOADING_PLACEHOLDER) {
            let mut combined = String::with_capacity(self.html.len() + html.len());
            combined.push_str(&self.html[..pos]);
            combined.push_str(html);
            combined.push_str(&self.html[pos + LOADING_PLACEHOLDER.len()..]);
            self.html = combined;
        } else if self.has_real_content() {
            self.html.push_str(RESPONSE_SEPARATOR);
            self.html.push_str(html);
        } else {
            self.html = html.to_string();
        }
    }
}

/// Strip markup from a serialized fragment, leaving readable text.
/// Tags become single spaces so adjacent blocks do not run together.
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    // Collapse runs of whitespace left behind by removed tags
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count words: split on whitespace, drop empty tokens
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Heuristic used when persisting: treat content as HTML when it is
/// bracketed by tags
pub fn looks_like_html(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.starts_with('<') && trimmed.ends_with('>')
}

/// Wrap plain text into paragraph elements, skipping blank lines
pub fn text_to_html(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("<p>{}</p>", line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello</p><p>world</p>"), "Hello world");
        assert_eq!(strip_tags("plain text"), "plain text");
        assert_eq!(strip_tags("a &amp; b"), "a & b");
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("Hello world"), 2);
        assert_eq!(count_words("  one   two  three "), 3);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
    }

    #[test]
    fn test_text_to_html_skips_blank_lines() {
        assert_eq!(
            text_to_html("first\n\nsecond\n"),
            "<p>first</p><p>second</p>"
        );
    }

    #[test]
    fn test_load_detects_html() {
        let mut surface = EditorSurface::new(PROSE_PLACEHOLDER);
        surface.load("<p>already html</p>");
        assert_eq!(surface.content(), "<p>already html</p>");

        surface.load("just text");
        assert_eq!(surface.content(), "<p>just text</p>");

        surface.load("   ");
        assert!(surface.is_placeholder());
    }

    #[test]
    fn test_begin_loading_replaces_placeholder() {
        let mut surface = EditorSurface::new(PROSE_PLACEHOLDER);
        assert!(!surface.begin_loading());
        assert_eq!(surface.content(), LOADING_PLACEHOLDER);
    }

    #[test]
    fn test_begin_loading_appends_after_content() {
        let mut surface = EditorSurface::new(PROSE_PLACEHOLDER);
        surface.set_content("<p>existing prose</p>");
        assert!(surface.begin_loading());
        assert!(surface.content().starts_with("<p>existing prose</p>"));
        assert!(surface.content().contains(RESPONSE_SEPARATOR));
        assert!(surface.content().ends_with(LOADING_PLACEHOLDER));
    }

    #[test]
    fn test_commit_targets_loading_placeholder() {
        let mut surface = EditorSurface::new(PROSE_PLACEHOLDER);
        surface.set_content("<p>existing</p>");
        surface.begin_loading();
        surface.commit("<p>new</p>");

        assert_eq!(
            surface.content(),
            format!("<p>existing</p>{}<p>new</p>", RESPONSE_SEPARATOR)
        );
    }

    #[test]
    fn test_commit_replaces_placeholder_content() {
        let mut surface = EditorSurface::new(PROSE_PLACEHOLDER);
        surface.commit("<p>first</p>");
        assert_eq!(surface.content(), "<p>first</p>");
    }

    #[test]
    fn test_word_count_ignores_markup() {
        let mut surface = EditorSurface::new(PROSE_PLACEHOLDER);
        surface.set_content("<p>Hello brave new world</p>");
        assert_eq!(surface.word_count(), 4);
    }
}
