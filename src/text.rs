//! Text normalization shared by the indexers.
//!
//! Extracted PDF text carries invisible characters and broken hyphenation;
//! these helpers repair both before any comparison happens.

use once_cell::sync::Lazy;
use regex::Regex;

static INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{200B}-\u{200F}\u{2028}-\u{202F}\u{FEFF}]").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static SPACED_HYPHEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*").unwrap());

/// Remove zero-width and other invisible characters.
pub fn strip_zero_width_chars(text: &str) -> String {
    INVISIBLE.replace_all(text, "").into_owned()
}

/// Normalize a section or heading title for comparison.
///
/// Strips invisible characters, lowercases, and collapses whitespace.
pub fn normalize_title(title: &str) -> String {
    let stripped = strip_zero_width_chars(title).to_lowercase();
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Normalize text for search.
///
/// Collapses whitespace around hyphens ("cross- reference" becomes
/// "cross-reference") and then collapses all remaining whitespace runs.
pub fn normalize_for_search(text: &str) -> String {
    let dehyphenated = SPACED_HYPHEN.replace_all(text, "-");
    WHITESPACE.replace_all(&dehyphenated, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_zero_width_chars() {
        assert_eq!(strip_zero_width_chars("Hello World"), "Hello World");
        assert_eq!(strip_zero_width_chars("Hello\u{200B}World"), "HelloWorld");
        assert_eq!(strip_zero_width_chars("\u{FEFF}Start"), "Start");
        assert_eq!(strip_zero_width_chars("Line1\u{2028}Line2"), "Line1Line2");
        assert_eq!(strip_zero_width_chars("\u{200B}\u{200F}\u{FEFF}"), "");
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  7.3.4  TYPES  OF  FUNCTION  "), "7.3.4 types of function");
        assert_eq!(normalize_title("Tabs\t\tand\nspaces"), "tabs and spaces");
        // Zero-width spaces vanish rather than becoming separators
        assert_eq!(normalize_title("Introduction\u{200B}To\u{200B}PDF"), "introductiontopdf");
        assert_eq!(normalize_title("   \u{200B}   "), "");
        assert_eq!(normalize_title("Hello-World"), "hello-world");
    }

    #[test]
    fn test_normalize_for_search() {
        assert_eq!(normalize_for_search("cross- reference"), "cross-reference");
        assert_eq!(normalize_for_search("cross -reference"), "cross-reference");
        assert_eq!(normalize_for_search("a   b\n\tc"), "a b c");
    }
}
