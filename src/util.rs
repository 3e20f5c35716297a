//! Small shared helpers

/// Truncate to at most `max` characters, always cutting on a char boundary.
/// Used for log and error-message previews of content that may contain
/// multi-byte text.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_truncate_keeps_multibyte_chars_whole() {
        // The 50th character is multi-byte; a byte-offset cut would land
        // inside it
        let s = format!("{}é suffix", "a".repeat(49));
        let cut = truncate_chars(&s, 50);
        assert_eq!(cut.chars().count(), 50);
        assert!(cut.ends_with('é'));

        assert_eq!(truncate_chars("café", 4), "café");
        assert_eq!(truncate_chars("café", 3), "caf");
    }
}
