//! Table collection from section content.
//!
//! Tables come from the structure tree when the document tags them. For
//! sections without tagged tables, `Table N — Title` captions followed by
//! tab or multi-space separated paragraphs are read as tables instead.

use crate::content::ContentElement;
use crate::error::{Result, SpecIndexError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A table of a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Position among the section's tables.
    pub index: usize,
    pub caption: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Paragraphs longer than this without a tab are prose, not rows.
const MAX_ROW_LEN: usize = 300;

static CAPTION_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Table\s+\d+").unwrap());
static CAPTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(Table\s+\d+)\s*[—–-]\s*(.+)").unwrap());
static CELL_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// All tables of a section, tagged tables first, text detection otherwise.
pub fn collect_tables(content: &[ContentElement]) -> Vec<TableInfo> {
    let tables = collect_tagged_tables(content);
    if tables.is_empty() {
        detect_text_tables(content)
    } else {
        tables
    }
}

/// Pick one table by index.
pub fn select_table(tables: Vec<TableInfo>, index: usize, section: &str) -> Result<TableInfo> {
    let count = tables.len();
    tables
        .into_iter()
        .nth(index)
        .ok_or_else(|| SpecIndexError::TableIndexOutOfRange {
            index,
            section: section.to_string(),
            count,
        })
}

/// Tables from `table` elements.
///
/// A preceding `Table N` paragraph becomes the caption. A captionless table
/// repeating the previous table's headers continues it across a page break.
fn collect_tagged_tables(content: &[ContentElement]) -> Vec<TableInfo> {
    let mut tables: Vec<TableInfo> = Vec::new();

    for (i, element) in content.iter().enumerate() {
        let ContentElement::Table { headers, rows } = element else {
            continue;
        };

        let caption = match i.checked_sub(1).map(|p| &content[p]) {
            Some(ContentElement::Paragraph { text }) if CAPTION_PREFIX.is_match(text) => {
                Some(text.clone())
            }
            _ => None,
        };

        if caption.is_none() && !headers.is_empty() {
            if let Some(previous) = tables.last_mut() {
                if previous.headers == *headers {
                    previous.rows.extend(rows.iter().cloned());
                    continue;
                }
            }
        }

        tables.push(TableInfo {
            index: tables.len(),
            caption,
            headers: headers.clone(),
            rows: rows.clone(),
        });
    }

    tables
}

fn split_cells(text: &str) -> Vec<String> {
    let cells: Vec<&str> = if text.contains('\t') {
        text.split('\t').collect()
    } else {
        CELL_GAP.split(text).collect()
    };

    cells
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tables recognized from captioned runs of column-aligned paragraphs.
fn detect_text_tables(content: &[ContentElement]) -> Vec<TableInfo> {
    let mut tables = Vec::new();

    for (i, element) in content.iter().enumerate() {
        let ContentElement::Paragraph { text: caption } = element else {
            continue;
        };
        if !CAPTION_LINE.is_match(caption) {
            continue;
        }

        let mut headers = Vec::new();
        let mut rows = Vec::new();

        for next in &content[i + 1..] {
            let ContentElement::Paragraph { text } = next else {
                break;
            };
            if CAPTION_LINE.is_match(text) {
                break;
            }
            if text.chars().count() > MAX_ROW_LEN && !text.contains('\t') {
                break;
            }

            let cells = split_cells(text);
            if cells.len() < 2 {
                break;
            }
            if headers.is_empty() {
                headers = cells;
            } else {
                rows.push(cells);
            }
        }

        if !headers.is_empty() || !rows.is_empty() {
            tables.push(TableInfo {
                index: tables.len(),
                caption: Some(caption.clone()),
                headers,
                rows,
            });
        }
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> ContentElement {
        ContentElement::Table {
            headers: strings(headers),
            rows: rows.iter().map(|r| strings(r)).collect(),
        }
    }

    #[test]
    fn test_caption_from_previous_paragraph() {
        let content = vec![
            ContentElement::paragraph("Table 5 — Entries common to all stream dictionaries"),
            table(&["Key", "Type"], &[&["Length", "integer"]]),
            ContentElement::paragraph("Some prose."),
            table(&["Operator", "Meaning"], &[&["q", "save"]]),
        ];
        let tables = collect_tables(&content);

        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables[0].caption.as_deref(),
            Some("Table 5 — Entries common to all stream dictionaries")
        );
        assert_eq!(tables[1].caption, None);
        assert_eq!(tables[1].index, 1);
    }

    #[test]
    fn test_continuation_merged() {
        let content = vec![
            ContentElement::paragraph("Table 5 — Stream entries"),
            table(&["Key", "Type"], &[&["Length", "integer"]]),
            table(&["Key", "Type"], &[&["Filter", "name"]]),
            table(&[], &[&["orphan", "row"]]),
        ];
        let tables = collect_tables(&content);

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows, vec![strings(&["Length", "integer"]), strings(&["Filter", "name"])]);
        // Tables without headers are never continuations
        assert!(tables[1].headers.is_empty());
    }

    #[test]
    fn test_captioned_table_with_same_headers_is_new() {
        let content = vec![
            table(&["Key", "Type"], &[&["A", "b"]]),
            ContentElement::paragraph("Table 6 — More entries"),
            table(&["Key", "Type"], &[&["C", "d"]]),
        ];
        assert_eq!(collect_tables(&content).len(), 2);
    }

    #[test]
    fn test_text_fallback() {
        let content = vec![
            ContentElement::paragraph("Intro."),
            ContentElement::paragraph("Table 3 – Escape sequences"),
            ContentElement::paragraph("Sequence\tMeaning"),
            ContentElement::paragraph("\\n    Line feed"),
            ContentElement::paragraph("\\r  Carriage return"),
            ContentElement::paragraph("Single"),
            ContentElement::paragraph("ignored  row"),
        ];
        let tables = collect_tables(&content);

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].caption.as_deref(), Some("Table 3 – Escape sequences"));
        assert_eq!(tables[0].headers, strings(&["Sequence", "Meaning"]));
        assert_eq!(
            tables[0].rows,
            vec![strings(&["\\n", "Line feed"]), strings(&["\\r", "Carriage return"])]
        );
    }

    #[test]
    fn test_text_fallback_stops_at_prose_and_captions() {
        let long = format!("{}  {}", "word ".repeat(70), "tail");
        let content = vec![
            ContentElement::paragraph("Table 1 - First"),
            ContentElement::paragraph("A  B"),
            ContentElement::paragraph(long),
            ContentElement::paragraph("Table 2 - Second"),
            ContentElement::paragraph("C  D"),
            ContentElement::paragraph("Table 3 - Empty"),
            ContentElement::heading(2, "x  y"),
        ];
        let tables = collect_tables(&content);

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].headers, strings(&["A", "B"]));
        assert!(tables[0].rows.is_empty());
        assert_eq!(tables[1].headers, strings(&["C", "D"]));
        assert_eq!(tables[1].index, 1);
    }

    #[test]
    fn test_select_table() {
        let tables = collect_tables(&[table(&["K"], &[&["v"]])]);
        assert_eq!(select_table(tables.clone(), 0, "7.3").unwrap().headers, strings(&["K"]));

        let err = select_table(tables, 3, "7.3").unwrap_err();
        assert!(matches!(
            err,
            SpecIndexError::TableIndexOutOfRange { index: 3, count: 1, .. }
        ));
        assert!(err.to_string().contains("Section \"7.3\" has 1 table(s)"));
    }
}
