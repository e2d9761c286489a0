//! Structured content extraction.
//!
//! For every page of a range, the page's structure tree is walked and its
//! marked-content leaves are bound to the page's text runs, producing a
//! flat sequence of [`ContentElement`]s. Untagged pages degrade to a single
//! paragraph holding all of the page's text.

use crate::concurrency::map_concurrent;
use crate::document::{DocumentPort, StructChild, StructNode, TextItem};
use crate::error::Result;
use crate::text::strip_zero_width_chars;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One semantic element of section content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentElement {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    List { items: Vec<String> },
    Table { headers: Vec<String>, rows: Vec<Vec<String>> },
    Note { label: String, text: String },
    Code { text: String },
}

impl ContentElement {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        ContentElement::Heading {
            level,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        ContentElement::Paragraph { text: text.into() }
    }

    pub fn note(label: impl Into<String>, text: impl Into<String>) -> Self {
        ContentElement::Note {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// Structure roles the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Artifact,
    Heading(u8),
    Paragraph,
    List,
    ListItem,
    ListLabel,
    ListBody,
    Table,
    TableRow,
    TableHeaderCell,
    TableHead,
    TableBody,
    TableFoot,
    Code,
    Container,
}

impl Role {
    fn parse(role: &str) -> Self {
        match role {
            "Artifact" => Role::Artifact,
            "H" => Role::Heading(3),
            "H1" => Role::Heading(1),
            "H2" => Role::Heading(2),
            "H3" => Role::Heading(3),
            "H4" => Role::Heading(4),
            "H5" => Role::Heading(5),
            "H6" => Role::Heading(6),
            "P" => Role::Paragraph,
            "L" => Role::List,
            "LI" => Role::ListItem,
            "Lbl" => Role::ListLabel,
            "LBody" => Role::ListBody,
            "Table" => Role::Table,
            "TR" => Role::TableRow,
            "TH" => Role::TableHeaderCell,
            "THead" => Role::TableHead,
            "TBody" => Role::TableBody,
            "TFoot" => Role::TableFoot,
            "Code" => Role::Code,
            _ => Role::Container,
        }
    }
}

static NOTE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(NOTE\s*\d*|EXAMPLE\s*\d*)\s+").unwrap());

/// Text of each marked-content span, keyed by content id.
type TextMap = HashMap<String, String>;

/// Bind text runs to their enclosing marked-content ids.
///
/// Runs inside a span without an id (or outside any span) are dropped.
/// Several spans sharing an id accumulate into one string.
fn build_text_map(items: &[TextItem]) -> TextMap {
    let mut map = TextMap::new();
    let mut open: Vec<Option<&str>> = Vec::new();

    for item in items {
        match item {
            TextItem::Begin { content_id } => open.push(content_id.as_deref()),
            TextItem::End => {
                open.pop();
            }
            TextItem::Run { text, ends_line } => {
                if let Some(Some(id)) = open.last() {
                    let entry = map.entry(id.to_string()).or_default();
                    entry.push_str(text);
                    if *ends_line {
                        entry.push('\n');
                    }
                }
            }
        }
    }

    map
}

/// Collect all text under a node, skipping artifacts.
fn collect_text(node: &StructNode, texts: &TextMap) -> String {
    let mut out = String::new();
    for child in &node.children {
        match child {
            StructChild::Content(leaf) => {
                if let Some(text) = texts.get(&leaf.id) {
                    out.push_str(text);
                }
            }
            StructChild::Node(n) => {
                if Role::parse(&n.role) != Role::Artifact {
                    out.push_str(&collect_text(n, texts));
                }
            }
        }
    }
    out
}

fn child_nodes(node: &StructNode) -> impl Iterator<Item = &StructNode> {
    node.children.iter().filter_map(|c| match c {
        StructChild::Node(n) => Some(n),
        StructChild::Content(_) => None,
    })
}

/// Walk a structure tree, appending the elements it describes.
fn walk(node: &StructNode, texts: &TextMap, out: &mut Vec<ContentElement>) {
    for child in child_nodes(node) {
        match Role::parse(&child.role) {
            Role::Artifact => {}
            Role::Heading(level) => {
                let text = collect_text(child, texts).trim().to_string();
                if !text.is_empty() {
                    out.push(ContentElement::Heading { level, text });
                }
            }
            Role::Paragraph => {
                let text = collect_text(child, texts).trim().to_string();
                if !text.is_empty() {
                    out.push(classify_paragraph(text));
                }
            }
            Role::List => {
                let items = collect_list_items(child, texts);
                if !items.is_empty() {
                    out.push(ContentElement::List { items });
                }
            }
            Role::Table => {
                if let Some(table) = collect_table(child, texts) {
                    out.push(table);
                }
            }
            Role::Code => {
                let text = collect_text(child, texts).trim().to_string();
                if !text.is_empty() {
                    out.push(ContentElement::Code { text });
                }
            }
            _ => walk(child, texts, out),
        }
    }
}

/// Turn `NOTE n ...` / `EXAMPLE n ...` paragraphs into notes.
fn classify_paragraph(text: String) -> ContentElement {
    if let Some(caps) = NOTE_LABEL.captures(&text) {
        let label = caps[1].trim().to_string();
        let body = text[caps[0].len()..].trim().to_string();
        return ContentElement::Note { label, text: body };
    }
    ContentElement::Paragraph { text }
}

fn collect_list_items(list: &StructNode, texts: &TextMap) -> Vec<String> {
    child_nodes(list)
        .filter(|n| Role::parse(&n.role) == Role::ListItem)
        .map(|li| list_item_body(li, texts).trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Text of an `LI`: its `LBody`, or everything but the label when the
/// item has no body element.
fn list_item_body(li: &StructNode, texts: &TextMap) -> String {
    let bodies: Vec<&StructNode> = child_nodes(li)
        .filter(|n| Role::parse(&n.role) == Role::ListBody)
        .collect();

    if !bodies.is_empty() {
        return bodies.iter().map(|b| collect_text(b, texts)).collect();
    }

    let mut out = String::new();
    for child in &li.children {
        match child {
            StructChild::Content(leaf) => {
                if let Some(text) = texts.get(&leaf.id) {
                    out.push_str(text);
                }
            }
            StructChild::Node(n) => match Role::parse(&n.role) {
                Role::ListLabel | Role::Artifact => {}
                _ => out.push_str(&collect_text(n, texts)),
            },
        }
    }
    out
}

struct Row {
    cells: Vec<String>,
    all_header: bool,
    in_head: bool,
}

fn collect_rows(node: &StructNode, texts: &TextMap, in_head: bool, rows: &mut Vec<Row>) {
    for child in child_nodes(node) {
        match Role::parse(&child.role) {
            Role::TableRow => {
                let cells: Vec<&StructNode> = child_nodes(child).collect();
                let all_header = !cells.is_empty()
                    && cells
                        .iter()
                        .all(|c| Role::parse(&c.role) == Role::TableHeaderCell);
                rows.push(Row {
                    cells: cells
                        .iter()
                        .map(|c| collect_text(c, texts).trim().to_string())
                        .collect(),
                    all_header,
                    in_head,
                });
            }
            Role::TableHead => collect_rows(child, texts, true, rows),
            Role::TableBody | Role::TableFoot => collect_rows(child, texts, false, rows),
            _ => {}
        }
    }
}

/// Build a table from direct rows, `THead`/`TBody`/`TFoot` groups, or a
/// leading all-`TH` row.
fn collect_table(node: &StructNode, texts: &TextMap) -> Option<ContentElement> {
    let mut rows = Vec::new();
    collect_rows(node, texts, false, &mut rows);

    let has_head = rows.iter().any(|r| r.in_head);
    let mut headers = Vec::new();
    let mut body = Vec::new();

    for (i, row) in rows.into_iter().enumerate() {
        let is_header = if has_head {
            row.in_head && headers.is_empty()
        } else {
            i == 0 && row.all_header
        };

        if is_header {
            headers = row.cells;
        } else {
            body.push(row.cells);
        }
    }

    if headers.is_empty() && body.is_empty() {
        None
    } else {
        Some(ContentElement::Table {
            headers,
            rows: body,
        })
    }
}

/// Fallback for untagged pages: all text as one paragraph.
fn plain_text_elements(items: &[TextItem]) -> Vec<ContentElement> {
    let mut text = String::new();
    for item in items {
        if let TextItem::Run { text: run, ends_line } = item {
            text.push_str(run);
            if *ends_line {
                text.push('\n');
            }
        }
    }

    let text = text.trim();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![ContentElement::paragraph(text)]
    }
}

/// Extract the content elements of one page.
pub async fn extract_page_content(port: &dyn DocumentPort, page: usize) -> Result<Vec<ContentElement>> {
    let (tree, runs) = futures::try_join!(port.structure_tree(page), port.text_runs(page))?;

    let Some(tree) = tree else {
        return Ok(plain_text_elements(&runs));
    };

    let texts = build_text_map(&runs);
    let mut elements = Vec::new();
    walk(&tree, &texts, &mut elements);
    Ok(elements)
}

/// Extract content for an inclusive page range.
///
/// Pages are read `concurrency` at a time and concatenated in page order.
/// When `section_number` is given, content preceding that section's own
/// heading (the tail of the previous section sharing the first page) is
/// discarded.
pub async fn extract_section_content(
    port: &dyn DocumentPort,
    start_page: usize,
    end_page: usize,
    section_number: Option<&str>,
    concurrency: usize,
) -> Result<Vec<ContentElement>> {
    let pages: Vec<usize> = (start_page..=end_page).collect();
    let per_page =
        map_concurrent(pages, concurrency, |page, _| extract_page_content(port, page)).await?;

    let mut elements: Vec<ContentElement> = per_page.into_iter().flatten().collect();

    if let Some(number) = section_number {
        trim_to_section_heading(&mut elements, number);
    }

    Ok(elements)
}

/// Drop everything before the heading that opens `section_number`.
fn trim_to_section_heading(elements: &mut Vec<ContentElement>, section_number: &str) {
    let numbered = section_number.starts_with(|c: char| c.is_ascii_digit());
    let prefix = format!("{} ", section_number);
    let lowercase_key = section_number.to_lowercase();

    let position = elements.iter().position(|el| match el {
        ContentElement::Heading { text, .. } => {
            let text = strip_zero_width_chars(text);
            if numbered {
                text.starts_with(&prefix)
            } else {
                text.to_lowercase().starts_with(&lowercase_key)
            }
        }
        _ => false,
    });

    if let Some(i) = position {
        if i > 0 {
            elements.drain(..i);
        }
    }
}
