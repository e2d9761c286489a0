//! Term definition extraction from the glossary section.
//!
//! Two glossary layouts are understood. When the glossary is split into
//! numbered subsections, each subsection is one entry and is read with
//! [`parse_definition_entry`]. When it is a single flat section, terms and
//! definitions are told apart heuristically by [`parse_glossary_content`].

use crate::content::ContentElement;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A glossary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub term: String,
    pub definition: String,
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*\s+").unwrap());
static SOURCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[SOURCE:\s*([^\]]+)\]").unwrap());
static TOP_LEVEL_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s").unwrap());

fn find_source(text: &str) -> Option<String> {
    SOURCE.captures(text).map(|caps| caps[1].trim().to_string())
}

/// Term, definition paragraphs, notes and source gathered so far.
#[derive(Debug, Default)]
struct Entry {
    term: String,
    paragraphs: Vec<String>,
    notes: Vec<String>,
    source: Option<String>,
}

impl Entry {
    fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Default::default()
        }
    }

    fn push_paragraph(&mut self, text: &str) {
        if let Some(source) = find_source(text) {
            self.source = Some(source);
        }
        self.paragraphs.push(text.to_string());
    }

    fn push_note(&mut self, label: &str, text: &str) {
        self.notes.push(format!("{}: {}", label, text));
    }

    fn into_definition(self, section: String) -> Option<Definition> {
        if self.term.is_empty() || self.paragraphs.is_empty() {
            return None;
        }
        Some(Definition {
            term: self.term,
            definition: self.paragraphs.join(" ").trim().to_string(),
            section,
            notes: (!self.notes.is_empty()).then_some(self.notes),
            source: self.source,
        })
    }
}

/// Read one glossary subsection.
///
/// The first heading names the term (falling back to `section_title`), the
/// paragraphs form the definition and notes are kept as `label: text`.
pub fn parse_definition_entry(
    section_number: &str,
    section_title: &str,
    content: &[ContentElement],
) -> Option<Definition> {
    let term = content
        .iter()
        .find_map(|el| match el {
            ContentElement::Heading { text, .. } => {
                Some(NUMBER_PREFIX.replace(text.trim(), "").trim().to_string())
            }
            _ => None,
        })
        .filter(|term| !term.is_empty())
        .unwrap_or_else(|| section_title.trim().to_string());

    let mut entry = Entry::new(term);
    for element in content {
        match element {
            ContentElement::Paragraph { text } => entry.push_paragraph(text.trim()),
            ContentElement::Note { label, text } => entry.push_note(label, text),
            _ => {}
        }
    }

    entry.into_definition(section_number.to_string())
}

/// Whether a paragraph reads like a term rather than definition prose.
pub fn is_likely_term(text: &str) -> bool {
    let t = text.trim();
    let len = t.chars().count();
    len > 0
        && len < 80
        && !t.ends_with(['.', ':', ')'])
        && !t.starts_with("NOTE")
        && !t.starts_with("EXAMPLE")
        && !t.starts_with('[')
        && !t.starts_with("For the purposes")
        && !t.starts_with("ISO ")
        && !t.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// `"<key>.<n>"` at the start of `text`, with the remainder.
fn split_marker<'t>(text: &'t str, key: &str) -> Option<(&'t str, &'t str)> {
    let rest = text.strip_prefix(key)?.strip_prefix('.')?;
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let marker_len = text.len() - rest.len() + digits;
    Some((&text[..marker_len], &text[marker_len..]))
}

/// Where the flat glossary parser is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before the first term: introductory boilerplate is skipped.
    Intro,
    /// Reading entries.
    Entries,
}

/// Segments a flat glossary into definitions.
///
/// Without a term pending, the parser awaits a term; with a term, it awaits
/// definition paragraphs; a new term or marker after a definition flushes.
struct GlossaryParser<'a> {
    key: &'a str,
    phase: Phase,
    pending: Option<Entry>,
    counter: usize,
    definitions: Vec<Definition>,
}

impl<'a> GlossaryParser<'a> {
    fn new(key: &'a str) -> Self {
        Self {
            key,
            phase: Phase::Intro,
            pending: None,
            counter: 0,
            definitions: Vec::new(),
        }
    }

    fn flush(&mut self) {
        let Some(entry) = self.pending.take() else {
            return;
        };
        if entry.term.is_empty() || entry.paragraphs.is_empty() {
            return;
        }
        self.counter += 1;
        let section = format!("{}.{}", self.key, self.counter);
        if let Some(definition) = entry.into_definition(section) {
            self.definitions.push(definition);
        }
    }

    /// Whether a heading belongs to a later top-level section.
    fn leaves_glossary(&self, heading: &str) -> bool {
        let Some(caps) = TOP_LEVEL_HEADING.captures(heading) else {
            return false;
        };
        match (caps[1].parse::<u32>(), self.key.parse::<u32>()) {
            (Ok(number), Ok(key)) => number > key,
            _ => &caps[1] != self.key,
        }
    }

    /// A list that only indexes entry numbers (`3.1`, `3.2`, ...).
    fn is_number_list(&self, items: &[String]) -> bool {
        items.iter().all(|item| {
            item.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .all(|line| matches!(split_marker(line, self.key), Some((_, ""))))
        })
    }

    fn marker<'t>(&self, element: &'t ContentElement) -> Option<Option<&'t str>> {
        match element {
            ContentElement::Paragraph { text } => match split_marker(text.trim(), self.key) {
                Some((_, "")) => Some(None),
                _ => None,
            },
            ContentElement::Heading { text, .. } => match split_marker(text.trim(), self.key) {
                Some((_, rest)) if rest.starts_with(char::is_whitespace) => Some(Some(rest.trim())),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns `false` once the glossary has ended.
    fn step(&mut self, element: &ContentElement) -> bool {
        if let ContentElement::Heading { text, .. } = element {
            if text.starts_with(&format!("{} ", self.key)) {
                return true;
            }
            if self.leaves_glossary(text) {
                return false;
            }
        }

        if let ContentElement::List { items } = element {
            if self.is_number_list(items) {
                return true;
            }
        }

        if let Some(inline_term) = self.marker(element) {
            if self.phase == Phase::Entries {
                self.flush();
            }
            self.phase = Phase::Entries;
            if let Some(term) = inline_term.filter(|t| !t.is_empty()) {
                self.pending = Some(Entry::new(term));
            }
            return true;
        }

        match element {
            ContentElement::Paragraph { text } => self.paragraph(text.trim()),
            ContentElement::Note { label, text } => {
                if let Some(entry) = self.pending.as_mut() {
                    entry.push_note(label, text);
                }
            }
            _ => {}
        }
        true
    }

    fn paragraph(&mut self, text: &str) {
        let term_like = is_likely_term(text);

        if self.phase == Phase::Intro {
            if term_like {
                self.phase = Phase::Entries;
                self.pending = Some(Entry::new(text));
            }
            return;
        }

        let has_definition = self.pending.as_ref().map(|e| !e.paragraphs.is_empty());
        match (has_definition, term_like) {
            (None, true) => self.pending = Some(Entry::new(text)),
            (None, false) => {}
            (Some(true), true) => {
                self.flush();
                self.pending = Some(Entry::new(text));
            }
            (Some(_), _) => {
                if let Some(entry) = self.pending.as_mut() {
                    entry.push_paragraph(text);
                }
            }
        }
    }

    fn finish(mut self) -> Vec<Definition> {
        self.flush();
        self.definitions
    }
}

/// Segment a flat glossary section (`key` is its section number) into
/// definitions, numbered `<key>.1`, `<key>.2`, ... in order.
pub fn parse_glossary_content(key: &str, content: &[ContentElement]) -> Vec<Definition> {
    let mut parser = GlossaryParser::new(key);
    for element in content {
        if !parser.step(element) {
            break;
        }
    }
    parser.finish()
}

/// Keep definitions whose term or definition contains `term`, ignoring case.
pub fn filter_definitions(definitions: &[Definition], term: &str) -> Vec<Definition> {
    let needle = term.to_lowercase();
    definitions
        .iter()
        .filter(|d| d.term.to_lowercase().contains(&needle) || d.definition.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
