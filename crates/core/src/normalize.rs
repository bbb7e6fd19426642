//! Paragraph text normalization for `texts/slide-NNN.txt`.
//!
//! Applies Unicode NFC composition, folds line breaks and tabs into spaces,
//! collapses whitespace runs and trims each paragraph.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse runs of horizontal whitespace into one space.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}\u{000B}]+").expect("Invalid regex"));

/// Control characters that PowerPoint uses inside runs (vertical tab for soft
/// breaks) or that leak from copy/paste.
const CONTROL_CHARS: &[char] = &['\u{000B}', '\u{000C}', '\r', '\n'];

/// Normalizer for extracted paragraph text.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    /// Create a new text normalizer.
    pub fn new() -> Self {
        Self
    }

    /// Normalize one paragraph to a single line.
    pub fn normalize_paragraph(&self, text: &str) -> String {
        let composed: String = text.nfc().collect();
        let flattened: String = composed
            .chars()
            .map(|c| if CONTROL_CHARS.contains(&c) { ' ' } else { c })
            .collect();

        WHITESPACE_COLLAPSE_REGEX
            .replace_all(&flattened, " ")
            .trim()
            .to_string()
    }

    /// Normalize paragraphs, dropping the ones that end up empty.
    pub fn normalize_paragraphs<I, S>(&self, paragraphs: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paragraphs
            .into_iter()
            .map(|p| self.normalize_paragraph(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Render normalized paragraphs as file content, one line each.
    pub fn to_file_content(&self, lines: &[String]) -> String {
        if lines.is_empty() {
            String::new()
        } else {
            format!("{}\n", lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        let normalizer = TextNormalizer::new();
        assert_eq!(
            normalizer.normalize_paragraph("  Quarterly \t  results  "),
            "Quarterly results"
        );
    }

    #[test]
    fn test_line_breaks_become_spaces() {
        let normalizer = TextNormalizer::new();
        assert_eq!(
            normalizer.normalize_paragraph("First\u{000B}second\r\nthird"),
            "First second third"
        );
    }

    #[test]
    fn test_nfc_composition() {
        let normalizer = TextNormalizer::new();
        // 'e' + combining acute accent
        assert_eq!(normalizer.normalize_paragraph("Caf\u{0065}\u{0301}"), "Caf\u{00E9}");
    }

    #[test]
    fn test_normalize_paragraphs_filters_empty() {
        let normalizer = TextNormalizer::new();
        let lines = normalizer.normalize_paragraphs(["Title", "   ", "", "Body"]);
        assert_eq!(lines, vec!["Title", "Body"]);
        assert_eq!(normalizer.to_file_content(&lines), "Title\nBody\n");
        assert_eq!(normalizer.to_file_content(&[]), "");
    }
}
