//! Section index built from the document outline.
//!
//! The outline (bookmark tree) is turned into two views: the resolved tree
//! itself, and a flat depth-first list of [`SectionInfo`] records with
//! parent/child links and computed page ranges, keyed by section number.

use crate::document::{DocumentPort, OutlineNode};
use crate::text::strip_zero_width_chars;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A resolved outline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineEntry {
    /// Full bookmark title.
    pub title: String,

    /// 1-based page, -1 when the destination could not be resolved.
    pub page: i64,

    /// Parsed section number, if the title carries one.
    pub section_number: Option<String>,

    /// Child entries.
    #[serde(default)]
    pub children: Vec<OutlineEntry>,
}

impl OutlineEntry {
    /// Create an entry, parsing the section number from the title.
    pub fn new(title: impl Into<String>, page: i64) -> Self {
        let title = title.into();
        let section_number = parse_section_number(&title);
        Self {
            title,
            page,
            section_number,
            children: Vec::new(),
        }
    }

    /// Add a child entry.
    pub fn with_child(mut self, child: OutlineEntry) -> Self {
        self.children.push(child);
        self
    }

    /// Key this entry is stored under in a [`SectionIndex`].
    pub fn key(&self) -> &str {
        self.section_number.as_deref().unwrap_or(&self.title)
    }

    /// Recursively count all entries in this subtree (including self).
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Format the subtree as a string for display.
    pub fn format_tree(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        let mut result = if self.page >= 1 {
            format!("{}{} [page {}]\n", prefix, self.title, self.page)
        } else {
            format!("{}{} [unresolved]\n", prefix, self.title)
        };

        for child in &self.children {
            result.push_str(&child.format_tree(indent + 1));
        }

        result
    }
}

/// Flat record for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionInfo {
    /// Section key: the parsed number, or the full title when none parses.
    pub section_number: String,
    /// Title with the number prefix removed.
    pub title: String,
    /// First page (1-based).
    pub page: usize,
    /// Last page (inclusive).
    pub end_page: usize,
    /// 0 for top-level sections.
    pub depth: usize,
    /// Parent section key.
    pub parent: Option<String>,
    /// Child section keys.
    pub children: Vec<String>,
}

impl SectionInfo {
    /// Whether `other` is this section or one of its numbered descendants.
    pub fn covers(&self, key: &str) -> bool {
        key == self.section_number || key.starts_with(&format!("{}.", self.section_number))
    }
}

/// Tree and flat views of a document's sections.
#[derive(Debug, Clone)]
pub struct SectionIndex {
    /// Resolved outline, as read from the document.
    pub tree: Vec<OutlineEntry>,
    /// Sections in depth-first order.
    pub flat_order: Vec<SectionInfo>,
    /// Total page count.
    pub total_pages: usize,
    /// Key (and lowercase alias) to position in `flat_order`.
    lookup: HashMap<String, usize>,
}

impl SectionIndex {
    /// Look up a section by exact key (lowercase aliases included).
    pub fn get(&self, key: &str) -> Option<&SectionInfo> {
        self.lookup.get(key).map(|&i| &self.flat_order[i])
    }

    /// Number of distinct sections.
    pub fn len(&self) -> usize {
        self.flat_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat_order.is_empty()
    }

    /// Find a section by flexible matching.
    ///
    /// Tries the exact key, then the lowercase key, then `Annex X` for a
    /// single-letter query.
    pub fn find_section(&self, query: &str) -> Option<&SectionInfo> {
        if let Some(found) = self.get(query) {
            return Some(found);
        }

        if let Some(found) = self.get(&query.to_lowercase()) {
            return Some(found);
        }

        let mut chars = query.chars();
        if let (Some(letter), None) = (chars.next(), chars.next()) {
            if letter.is_ascii_alphabetic() {
                return self.get(&format!("Annex {}", letter.to_ascii_uppercase()));
            }
        }

        None
    }

    /// Section keys lexically close to `query`, for not-found hints.
    pub fn find_similar_sections(&self, query: &str, limit: usize) -> Vec<String> {
        let lower = query.to_lowercase();
        self.flat_order
            .iter()
            .filter(|info| {
                let key = info.section_number.to_lowercase();
                key.starts_with(&lower) || lower.starts_with(&key)
            })
            .take(limit)
            .map(|info| info.section_number.clone())
            .collect()
    }

    /// Last section starting on or before `page`.
    ///
    /// Assumes section start pages are non-decreasing in depth-first order.
    pub fn section_for_page(&self, page: usize) -> Option<&SectionInfo> {
        let mut result = None;
        for info in &self.flat_order {
            if info.page <= page {
                result = Some(info);
            } else {
                break;
            }
        }
        result
    }

    /// Get maximum depth of the tree.
    pub fn max_depth(&self) -> usize {
        self.flat_order
            .iter()
            .map(|s| s.depth + 1)
            .max()
            .unwrap_or(0)
    }

    /// Format the section tree for display.
    pub fn format(&self, name: &str) -> String {
        let mut result = format!(
            "Document: {} ({} pages, {} sections)\n",
            name,
            self.total_pages,
            self.len()
        );
        result.push_str(&"─".repeat(50));
        result.push('\n');

        for info in &self.flat_order {
            result.push_str(&format!(
                "{}{} {} [pages {}-{}]\n",
                "  ".repeat(info.depth),
                info.section_number,
                info.title,
                info.page,
                info.end_page
            ));
        }

        result
    }
}

static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\s+").unwrap());
static DOT_TERMINATED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.\s*[A-Z]").unwrap());
static ANNEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(annex\s+[a-z](?:\.\d+)*)\b").unwrap());
static APPENDIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^appendix\s+([a-z])\b").unwrap());
static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:\d+(?:\.\d+)*\s+|\d+\.\s*|annex\s+[a-z](?:\.\d+)*\s+|appendix\s+[a-z]:?\s+)").unwrap()
});
static ANNEX_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\((?:normative|informative)\)\s*").unwrap());

/// Parse a section number from an outline title.
///
/// Recognizes, in order: dotted numbers (`7.3.4 String objects`),
/// dot-terminated chapter numbers (`1. Introduction`), annexes
/// (`Annex A.1 ...`) and appendices (`Appendix B: ...`).
pub fn parse_section_number(title: &str) -> Option<String> {
    let title = strip_zero_width_chars(title);
    let title = title.trim_start();

    if let Some(caps) = NUMERIC.captures(title) {
        return Some(caps[1].to_string());
    }

    if let Some(caps) = DOT_TERMINATED.captures(title) {
        return Some(caps[1].to_string());
    }

    if let Some(caps) = ANNEX.captures(title) {
        return Some(caps[1].to_string());
    }

    if let Some(caps) = APPENDIX.captures(title) {
        return Some(format!("Appendix {}", caps[1].to_ascii_uppercase()));
    }

    None
}

/// Strip the section number prefix (and an annex annotation) from a title.
fn extract_title(full_title: &str, section_number: Option<&str>) -> String {
    if section_number.is_none() {
        return full_title.to_string();
    }

    let cleaned = strip_zero_width_chars(full_title);
    match NUMBER_PREFIX.find(cleaned.trim_start()) {
        Some(prefix) => {
            let rest = &cleaned.trim_start()[prefix.end()..];
            ANNEX_ANNOTATION.replace(rest, "").into_owned()
        }
        None => full_title.to_string(),
    }
}

/// Resolve the document's raw outline into [`OutlineEntry`] trees.
pub async fn resolve_outline(port: &dyn DocumentPort) -> crate::Result<Vec<OutlineEntry>> {
    match port.outline().await? {
        Some(nodes) => Ok(resolve_nodes(port, &nodes).await),
        None => Ok(Vec::new()),
    }
}

fn resolve_nodes<'a>(
    port: &'a dyn DocumentPort,
    nodes: &'a [OutlineNode],
) -> BoxFuture<'a, Vec<OutlineEntry>> {
    Box::pin(async move {
        let mut entries = Vec::with_capacity(nodes.len());
        for node in nodes {
            let page = match &node.dest {
                Some(dest) => port.resolve_destination(dest).await,
                None => -1,
            };
            let mut entry = OutlineEntry::new(node.title.clone(), page);
            entry.children = resolve_nodes(port, &node.children).await;
            entries.push(entry);
        }
        entries
    })
}

/// Build a section index from resolved outline entries.
///
/// Entries with an unresolved page are dropped together with their
/// subtree. Each section ends one page before the next section in
/// depth-first order starts (never before its own first page); the last
/// section runs to the end of the document.
pub fn build_section_index(outline: Vec<OutlineEntry>, total_pages: usize) -> SectionIndex {
    let mut flat_order = Vec::new();
    flatten(&outline, 0, None, &mut flat_order);

    let next_pages: Vec<Option<usize>> = flat_order
        .iter()
        .skip(1)
        .map(|s| Some(s.page))
        .chain(std::iter::once(None))
        .collect();

    for (info, next) in flat_order.iter_mut().zip(next_pages) {
        info.end_page = match next {
            Some(next_page) => info.page.max(next_page.saturating_sub(1)),
            None => total_pages.max(info.page),
        };
    }

    let mut lookup = HashMap::new();
    for (i, info) in flat_order.iter().enumerate() {
        let key = info.section_number.clone();
        let lower = key.to_lowercase();
        lookup.insert(key.clone(), i);
        if lower != key && !lookup.contains_key(&lower) {
            lookup.insert(lower, i);
        }
    }

    SectionIndex {
        tree: outline,
        flat_order,
        total_pages,
        lookup,
    }
}

fn flatten(
    entries: &[OutlineEntry],
    depth: usize,
    parent: Option<&str>,
    out: &mut Vec<SectionInfo>,
) {
    for entry in entries {
        if entry.page < 1 {
            continue;
        }

        let key = entry.key().to_string();
        out.push(SectionInfo {
            section_number: key.clone(),
            title: extract_title(&entry.title, entry.section_number.as_deref()),
            page: entry.page as usize,
            end_page: entry.page as usize,
            depth,
            parent: parent.map(str::to_string),
            children: entry
                .children
                .iter()
                .filter(|c| c.page >= 1)
                .map(|c| c.key().to_string())
                .collect(),
        });

        flatten(&entry.children, depth + 1, Some(&key), out);
    }
}

/// Prune an outline tree to `max_depth` levels.
pub fn prune_tree(entries: &[OutlineEntry], max_depth: usize) -> Vec<OutlineEntry> {
    fn prune(entries: &[OutlineEntry], depth: usize, max_depth: usize) -> Vec<OutlineEntry> {
        entries
            .iter()
            .map(|e| OutlineEntry {
                title: e.title.clone(),
                page: e.page,
                section_number: e.section_number.clone(),
                children: if depth + 1 < max_depth {
                    prune(&e.children, depth + 1, max_depth)
                } else {
                    Vec::new()
                },
            })
            .collect()
    }

    prune(entries, 0, max_depth)
}
