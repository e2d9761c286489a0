//! Section correlation between two versions of a specification.
//!
//! Sections of the older document are matched to the newer one by
//! normalized title, using the parent's title to tell apart repeated titles
//! such as "General".

use crate::outline::{SectionIndex, SectionInfo};
use crate::text::normalize_title;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::info;

/// How a matched section changed between versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    /// Same number.
    Same,
    /// Same title, different number.
    Moved,
    /// Matched through its parent's context only.
    Renamed,
}

/// Which document an unmatched section belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Version {
    #[serde(rename = "pdf17")]
    Older,
    #[serde(rename = "pdf20")]
    Newer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMapping {
    pub section17: String,
    pub section20: String,
    /// Title in the newer document.
    pub title: String,
    pub status: MappingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedSection {
    pub section: String,
    pub title: String,
    pub version: Version,
}

/// Full comparison result, optionally narrowed to one section subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionComparison {
    pub total_matched: usize,
    pub total_added: usize,
    pub total_removed: usize,
    pub matched: Vec<SectionMapping>,
    pub added: Vec<UnmatchedSection>,
    pub removed: Vec<UnmatchedSection>,
}

impl VersionComparison {
    fn new(
        matched: Vec<SectionMapping>,
        added: Vec<UnmatchedSection>,
        removed: Vec<UnmatchedSection>,
    ) -> Self {
        Self {
            total_matched: matched.len(),
            total_added: added.len(),
            total_removed: removed.len(),
            matched,
            added,
            removed,
        }
    }

    /// Restrict to `section` and its descendants in either version.
    pub fn filter(&self, section: &str) -> VersionComparison {
        let prefix = format!("{}.", section);
        let within = |key: &str| key == section || key.starts_with(&prefix);

        VersionComparison::new(
            self.matched
                .iter()
                .filter(|m| within(&m.section20) || within(&m.section17))
                .cloned()
                .collect(),
            self.added.iter().filter(|a| within(&a.section)).cloned().collect(),
            self.removed.iter().filter(|r| within(&r.section)).cloned().collect(),
        )
    }

    /// Format the comparison for display.
    pub fn format(&self) -> String {
        let mut result = format!(
            "Matched: {}  Added: {}  Removed: {}\n",
            self.total_matched, self.total_added, self.total_removed
        );
        result.push_str(&"─".repeat(50));
        result.push('\n');

        for m in &self.matched {
            result.push_str(&format!(
                "{:<12} -> {:<12} {:?} {}\n",
                m.section17, m.section20, m.status, m.title
            ));
        }
        for a in &self.added {
            result.push_str(&format!("+ {} {}\n", a.section, a.title));
        }
        for r in &self.removed {
            result.push_str(&format!("- {} {}\n", r.section, r.title));
        }

        result
    }
}

/// `"<parent title> > <title>"`, normalized; just the title at top level.
fn context_key(section: &SectionInfo, index: &SectionIndex) -> String {
    let title = normalize_title(&section.title);
    match section.parent.as_deref().and_then(|p| index.get(p)) {
        Some(parent) => format!("{} > {}", normalize_title(&parent.title), title),
        None => title,
    }
}

fn mapping(older: &SectionInfo, newer: &SectionInfo) -> SectionMapping {
    let status = if older.section_number == newer.section_number {
        MappingStatus::Same
    } else if normalize_title(&older.title) == normalize_title(&newer.title) {
        MappingStatus::Moved
    } else {
        MappingStatus::Renamed
    };

    SectionMapping {
        section17: older.section_number.clone(),
        section20: newer.section_number.clone(),
        title: newer.title.clone(),
        status,
    }
}

/// Correlate the sections of two versions.
///
/// Each older section, in order, tries: a unique title match; among
/// several title matches, the first with an equal context key; without any
/// title match, a unique context-key match. A newer section is claimed at
/// most once. Unclaimed older sections are removed, unclaimed newer ones
/// added.
pub fn compare_sections(older: &SectionIndex, newer: &SectionIndex) -> VersionComparison {
    let start = Instant::now();

    let mut by_title: HashMap<String, Vec<&SectionInfo>> = HashMap::new();
    let mut by_context: HashMap<String, Vec<&SectionInfo>> = HashMap::new();
    for section in &newer.flat_order {
        let title = normalize_title(&section.title);
        if !title.is_empty() {
            by_title.entry(title).or_default().push(section);
        }
        by_context
            .entry(context_key(section, newer))
            .or_default()
            .push(section);
    }

    let mut claimed: HashSet<&str> = HashSet::new();
    let mut matched = Vec::new();
    let mut removed = Vec::new();

    for section in &older.flat_order {
        let title = normalize_title(&section.title);
        if title.is_empty() {
            continue;
        }

        let candidate = match by_title.get(&title).map(Vec::as_slice) {
            Some([only]) => Some(*only),
            Some(several) => {
                let context = context_key(section, older);
                several
                    .iter()
                    .find(|c| context_key(c, newer) == context)
                    .copied()
            }
            None => match by_context.get(&context_key(section, older)).map(Vec::as_slice) {
                Some([only]) => Some(*only),
                _ => None,
            },
        };

        match candidate {
            Some(found) if !claimed.contains(found.section_number.as_str()) => {
                claimed.insert(&found.section_number);
                matched.push(mapping(section, found));
            }
            _ => removed.push(UnmatchedSection {
                section: section.section_number.clone(),
                title: section.title.clone(),
                version: Version::Older,
            }),
        }
    }

    let added: Vec<UnmatchedSection> = newer
        .flat_order
        .iter()
        .filter(|s| !claimed.contains(s.section_number.as_str()))
        .map(|s| UnmatchedSection {
            section: s.section_number.clone(),
            title: s.title.clone(),
            version: Version::Newer,
        })
        .collect();

    info!(
        matched = matched.len(),
        added = added.len(),
        removed = removed.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Built version comparison"
    );

    VersionComparison::new(matched, added, removed)
}
