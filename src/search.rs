//! Full-text search over every page of a document.
//!
//! The index is a flat list of page texts tagged with their owning section.
//! Queries are matched as a normalized phrase first and fall back to an AND
//! match over the query's words.

use crate::concurrency::map_concurrent;
use crate::document::{DocumentPort, TextItem};
use crate::error::Result;
use crate::outline::SectionIndex;
use crate::text::normalize_for_search;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::info;

/// Points for each occurrence of the whole query phrase.
const PHRASE_SCORE: usize = 3;

/// Characters of context on each side of a snippet match.
const SNIPPET_CONTEXT: usize = 75;

/// Text of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number.
    pub page: usize,
    /// Key of the section owning the page, empty if none starts before it.
    pub section: String,
    /// All text runs of the page joined by spaces.
    pub text: String,
}

/// Page texts of a whole document.
#[derive(Debug, Clone)]
pub struct TextIndex {
    pub pages: Vec<PageText>,
    pub build_time: Duration,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub section: String,
    pub title: String,
    pub page: usize,
    pub snippet: String,
    pub score: usize,
}

/// Read every page of the document into a [`TextIndex`].
///
/// The document is made current first, since the whole page range is read.
pub async fn build_text_index(
    port: &dyn DocumentPort,
    sections: &SectionIndex,
    concurrency: usize,
) -> Result<TextIndex> {
    let start = Instant::now();
    port.make_current().await?;

    let pages: Vec<usize> = (1..=port.page_count()).collect();
    let texts = map_concurrent(pages, concurrency, |page, _| page_text(port, page)).await?;

    let pages: Vec<PageText> = texts
        .into_iter()
        .zip(1..)
        .map(|(text, page)| PageText {
            page,
            section: sections
                .section_for_page(page)
                .map(|s| s.section_number.clone())
                .unwrap_or_default(),
            text,
        })
        .collect();

    let build_time = start.elapsed();
    info!(
        pages = pages.len(),
        elapsed_ms = build_time.as_millis() as u64,
        "Built search index"
    );

    Ok(TextIndex { pages, build_time })
}

async fn page_text(port: &dyn DocumentPort, page: usize) -> Result<String> {
    let runs = port.text_runs(page).await?;
    Ok(join_runs(&runs))
}

fn join_runs(items: &[TextItem]) -> String {
    items
        .iter()
        .filter_map(|item| match item {
            TextItem::Run { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl TextIndex {
    /// Search the index.
    ///
    /// Hits are ranked by score, reduced to the best hit per section and
    /// truncated to `max_results`.
    pub fn search(&self, query: &str, sections: &SectionIndex, max_results: usize) -> Vec<SearchHit> {
        let normalized_query = normalize_for_search(&query.to_lowercase());
        let normalized_query = normalized_query.trim();
        let words: Vec<&str> = normalized_query.split_whitespace().collect();

        if words.is_empty() {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for page in &self.pages {
            let normalized = normalize_for_search(&page.text.to_lowercase());
            let Some((score, index)) = score_page(&normalized, normalized_query, &words) else {
                continue;
            };

            let title = sections
                .get(&page.section)
                .map(|s| s.title.clone())
                .unwrap_or_default();

            hits.push(SearchHit {
                section: page.section.clone(),
                title,
                page: page.page,
                snippet: snippet(&page.text, &normalized, index, query),
                score,
            });
        }

        hits.sort_by(|a, b| b.score.cmp(&a.score));

        let mut seen = HashSet::new();
        hits.retain(|hit| {
            let key = if hit.section.is_empty() {
                format!("page:{}", hit.page)
            } else {
                hit.section.clone()
            };
            seen.insert(key)
        });
        hits.truncate(max_results);
        hits
    }
}

/// Score a normalized page, returning the score and the byte index of the
/// first match. `None` when the page does not match.
fn score_page(text: &str, phrase: &str, words: &[&str]) -> Option<(usize, usize)> {
    if let Some(index) = text.find(phrase) {
        let occurrences = text.matches(phrase).count();
        return Some((occurrences * PHRASE_SCORE, index));
    }

    if words.len() < 2 {
        return None;
    }

    let mut score = 0;
    let mut first = usize::MAX;
    for word in words {
        let index = text.find(word)?;
        first = first.min(index);
        score += text.matches(word).count();
    }

    Some((score, first))
}

/// Cut a snippet around a match from the original page text.
///
/// The match position is known in the normalized text only, so it is mapped
/// back onto the original by the ratio of the two lengths.
fn snippet(original: &str, normalized: &str, match_byte: usize, query: &str) -> String {
    let original: Vec<char> = original.chars().collect();
    if original.is_empty() {
        return String::new();
    }

    let normalized_len = normalized.chars().count();
    let match_char = normalized[..match_byte].chars().count();

    let position = if match_char == 0 || normalized_len == 0 {
        0
    } else {
        let mapped = (match_char as f64 / normalized_len as f64 * original.len() as f64).floor();
        (mapped as usize).min(original.len() - 1)
    };

    let start = position.saturating_sub(SNIPPET_CONTEXT);
    let end = (position + query.chars().count() + SNIPPET_CONTEXT).min(original.len());

    let body: String = original[start..end].iter().collect();
    let mut result = String::new();
    if start > 0 {
        result.push_str("...");
    }
    result.push_str(body.trim());
    if end < original.len() {
        result.push_str("...");
    }
    result
}
