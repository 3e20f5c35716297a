//! Prompt assembly and response cleanup

use once_cell::sync::Lazy;
use regex::Regex;

static BOXED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\boxed\{([\s\S]*?)\}").expect("invalid boxed regex"));
static MARKDOWN_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```markdown\s+").expect("invalid markdown fence regex"));
static LANG_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:\w+)?\s+").expect("invalid lang fence regex"));
static PLAINTEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^plaintext\s+").expect("invalid plaintext regex"));

/// Assemble the complete prompt sent to the generation model: optional
/// style-guide preamble, the user's prompt, and optionally the existing
/// prose to continue from.
pub fn format_prompt(
    prompt: &str,
    style_guide: &str,
    previous_content: &str,
    include_previous: bool,
) -> String {
    let mut complete = String::new();

    if !style_guide.trim().is_empty() {
        complete.push_str(&format!("Style Guide: {}\n\n", style_guide.trim()));
    }

    complete.push_str(prompt.trim());

    if include_previous && !previous_content.trim().is_empty() {
        complete.push_str(&format!(
            "\n\nProse to continue: {}",
            previous_content.trim()
        ));
    }

    complete
}

/// Strip model-specific formatting artifacts from a response: boxed-answer
/// wrappers, fenced code-block markers and leading plaintext tags.
pub fn clean_response_text(response: &str) -> String {
    let text = BOXED_RE.replace_all(response, "$1");
    let text = MARKDOWN_FENCE_RE.replace_all(&text, "");
    let text = LANG_FENCE_RE.replace_all(&text, "");
    let text = text.replace("```", "");
    PLAINTEXT_RE.replace(&text, "").into_owned()
}
