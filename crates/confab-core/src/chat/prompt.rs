//! Prompt templates for derived-text requests and conversation titles.
//!
//! Templates use a single `{question}` placeholder that is replaced with
//! the caller's text.

use confab_types::chat::DeriveKind;

const QUESTION: &str = "{question}";

const MINDMAP_TEMPLATE: &str = r#"Turn the following content into a mind map written as a nested Markdown list.
Use a single top-level heading for the central topic, then indent sub-topics with "-".
Keep each node under ten words. Return ONLY the Markdown, nothing else.

Content:
{question}"#;

const SUMMARY_TEMPLATE: &str = r#"Summarize the following content in a few short paragraphs.
Keep the key facts, names, and numbers. Do not add information that is not in the content.

Content:
{question}"#;

/// Longest title derived from a first message, in characters.
const TITLE_MAX_CHARS: usize = 40;

pub fn template(kind: DeriveKind) -> &'static str {
    match kind {
        DeriveKind::Mindmap => MINDMAP_TEMPLATE,
        DeriveKind::Summary => SUMMARY_TEMPLATE,
    }
}

/// Substitute `text` for every `{question}` placeholder in the template.
pub fn render(kind: DeriveKind, text: &str) -> String {
    template(kind).replace(QUESTION, text)
}

/// Title for a new conversation: the first line of the opening message,
/// cut to a fixed number of characters.
pub fn title_from_message(message: &str) -> String {
    let first_line = message.trim().lines().next().unwrap_or_default().trim();
    let mut title: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
    if first_line.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_question() {
        let prompt = render(DeriveKind::Summary, "Rust has no garbage collector.");
        assert!(prompt.ends_with("Rust has no garbage collector."));
        assert!(!prompt.contains(QUESTION));
    }

    #[test]
    fn test_templates_differ_by_kind() {
        assert_ne!(template(DeriveKind::Mindmap), template(DeriveKind::Summary));
        assert!(render(DeriveKind::Mindmap, "x").contains("mind map"));
    }

    #[test]
    fn test_title_short_message_is_kept() {
        assert_eq!(title_from_message("  hello there \nsecond line"), "hello there");
    }

    #[test]
    fn test_title_long_message_is_cut_on_char_boundary() {
        let message = "界".repeat(50);
        let title = title_from_message(&message);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }
}
