//! Normative requirement extraction.
//!
//! Paragraphs, list items and notes are scanned for the ISO normative
//! keywords; every match yields the full sentence around it.

use crate::content::ContentElement;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// ISO requirement levels, longest keyword first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequirementLevel {
    #[serde(rename = "shall not")]
    ShallNot,
    #[serde(rename = "should not")]
    ShouldNot,
    #[serde(rename = "shall")]
    Shall,
    #[serde(rename = "should")]
    Should,
    #[serde(rename = "may")]
    May,
}

impl RequirementLevel {
    pub const ALL: [RequirementLevel; 5] = [
        RequirementLevel::ShallNot,
        RequirementLevel::ShouldNot,
        RequirementLevel::Shall,
        RequirementLevel::Should,
        RequirementLevel::May,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementLevel::ShallNot => "shall not",
            RequirementLevel::ShouldNot => "should not",
            RequirementLevel::Shall => "shall",
            RequirementLevel::Should => "should",
            RequirementLevel::May => "may",
        }
    }

    /// Parse a keyword (case-insensitive, inner whitespace collapsed).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        Self::ALL.into_iter().find(|level| level.as_str() == normalized)
    }
}

impl fmt::Display for RequirementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normative statement found in a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// `R-<section>-<n>`, unique within one extraction.
    pub id: String,
    pub level: RequirementLevel,
    /// The whole sentence carrying the keyword.
    pub text: String,
    pub section: String,
    pub section_title: String,
}

static KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(shall not|should not|shall|should|may)\b").unwrap());

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Extract the sentence around the character at `position`.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace (or the end of
/// the text). A terminator preceded by a digit is not taken as the start of
/// the sentence, so numbers such as "7.3.4" stay inside it.
pub fn extract_sentence(text: &str, position: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let position = position.min(chars.len());

    let mut start = position;
    while start > 0 {
        let c = chars[start - 1];
        let followed_by_space = start < chars.len() && chars[start].is_whitespace();
        if is_terminator(c) && followed_by_space {
            let after_digit = start >= 2 && chars[start - 2].is_ascii_digit();
            if !after_digit {
                break;
            }
        }
        start -= 1;
    }

    let mut end = position;
    while end < chars.len() {
        let c = chars[end];
        if is_terminator(c) {
            let next = chars.get(end + 1);
            let at_boundary = next.is_none_or(|n| n.is_whitespace());
            let inside_number = end > 0
                && chars[end - 1].is_ascii_digit()
                && next.is_some_and(|n| n.is_ascii_digit());
            if at_boundary && !inside_number {
                end += 1;
                break;
            }
        }
        end += 1;
    }

    chars[start..end].iter().collect::<String>().trim().to_string()
}

/// Extract all normative requirements from a section's content.
///
/// The same `(level, sentence)` pair is reported once per call, and ids are
/// numbered from 1 in document order.
pub fn extract_requirements(
    content: &[ContentElement],
    section_number: &str,
    section_title: &str,
) -> Vec<Requirement> {
    let mut extractor = Extractor {
        section_number,
        section_title,
        next_id: 1,
        seen: HashSet::new(),
        found: Vec::new(),
    };

    for element in content {
        match element {
            ContentElement::Paragraph { text } | ContentElement::Note { text, .. } => {
                extractor.scan(text)
            }
            ContentElement::List { items } => items.iter().for_each(|item| extractor.scan(item)),
            _ => {}
        }
    }

    extractor.found
}

struct Extractor<'a> {
    section_number: &'a str,
    section_title: &'a str,
    next_id: usize,
    seen: HashSet<(RequirementLevel, String)>,
    found: Vec<Requirement>,
}

impl Extractor<'_> {
    fn scan(&mut self, text: &str) {
        for caps in KEYWORD.captures_iter(text) {
            let Some(keyword) = caps.get(1) else {
                continue;
            };
            let Some(level) = RequirementLevel::parse(keyword.as_str()) else {
                continue;
            };

            let position = text[..keyword.start()].chars().count();
            let sentence = extract_sentence(text, position);

            if !self.seen.insert((level, sentence.clone())) {
                continue;
            }

            self.found.push(Requirement {
                id: format!("R-{}-{}", self.section_number, self.next_id),
                level,
                text: sentence,
                section: self.section_number.to_string(),
                section_title: self.section_title.to_string(),
            });
            self.next_id += 1;
        }
    }
}

/// Count requirements per level.
pub fn level_statistics(requirements: &[Requirement]) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    for req in requirements {
        *stats.entry(req.level.to_string()).or_insert(0) += 1;
    }
    stats
}
