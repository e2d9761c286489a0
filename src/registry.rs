//! Specification registry.
//!
//! Discovers document dumps in a directory, maps their file names to spec
//! ids, and opens them on demand through [`DocumentLoader`].

use crate::document::{DocumentPort, MemoryDocument};
use crate::error::{Result, SpecIndexError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Kind of specification document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecCategory {
    Standard,
    Ts,
    Pdfua,
    Guide,
    Appnote,
}

impl SpecCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecCategory::Standard => "standard",
            SpecCategory::Ts => "ts",
            SpecCategory::Pdfua => "pdfua",
            SpecCategory::Guide => "guide",
            SpecCategory::Appnote => "appnote",
        }
    }
}

impl fmt::Display for SpecCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecCategory {
    type Err = SpecIndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(SpecCategory::Standard),
            "ts" => Ok(SpecCategory::Ts),
            "pdfua" => Ok(SpecCategory::Pdfua),
            "guide" => Ok(SpecCategory::Guide),
            "appnote" => Ok(SpecCategory::Appnote),
            other => Err(SpecIndexError::InvalidArgument(format!(
                "Unknown category \"{}\". Expected one of: standard, ts, pdfua, guide, appnote",
                other
            ))),
        }
    }
}

/// Registered specification metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecInfo {
    pub id: String,
    pub title: String,
    pub filename: String,
    /// Unknown until the document is first opened.
    pub pages: Option<usize>,
    pub category: SpecCategory,
    /// Unknown until the section index is built.
    pub outline_entries: Option<usize>,
    pub description: String,
}

struct SpecPattern {
    id: &'static str,
    pattern: Regex,
    title: &'static str,
    category: SpecCategory,
    description: &'static str,
}

impl SpecPattern {
    fn new(
        id: &'static str,
        pattern: &str,
        title: &'static str,
        category: SpecCategory,
        description: &'static str,
    ) -> Self {
        Self {
            id,
            pattern: Regex::new(pattern).unwrap(),
            title,
            category,
            description,
        }
    }
}

static SPEC_PATTERNS: Lazy<Vec<SpecPattern>> = Lazy::new(|| {
    vec![
        SpecPattern::new(
            "iso32000-2",
            r"^ISO_32000-2_sponsored",
            "ISO 32000-2:2020 (PDF 2.0)",
            SpecCategory::Standard,
            "PDF 2.0 specification",
        ),
        SpecPattern::new(
            "pdf17",
            r"^PDF32000_2008",
            "PDF 1.7 (ISO 32000-1:2008)",
            SpecCategory::Standard,
            "PDF 1.7 specification",
        ),
        SpecPattern::new(
            "ts32001",
            r"^ISO_TS_32001",
            "ISO/TS 32001:2022 (Hash algorithms)",
            SpecCategory::Ts,
            "SHA-3 hash algorithm support in PDF",
        ),
        SpecPattern::new(
            "ts32002",
            r"^ISO_TS_32002",
            "ISO/TS 32002:2022 (Digital signatures)",
            SpecCategory::Ts,
            "Elliptic curve digital signatures in PDF",
        ),
        SpecPattern::new(
            "pdfua1",
            r"^ISO_14289-1",
            "ISO 14289-1 (PDF/UA-1)",
            SpecCategory::Pdfua,
            "Universal accessibility for PDF 1.7",
        ),
        SpecPattern::new(
            "pdfua2",
            r"^ISO_14289-2",
            "ISO 14289-2 (PDF/UA-2)",
            SpecCategory::Pdfua,
            "Universal accessibility for PDF 2.0",
        ),
    ]
});

struct RegistryEntry {
    path: PathBuf,
    id: &'static str,
    filename: String,
    title: String,
    category: SpecCategory,
    description: String,
    pages: OnceLock<usize>,
    outline_entries: OnceLock<usize>,
}

impl RegistryEntry {
    fn info(&self) -> SpecInfo {
        SpecInfo {
            id: self.id.to_string(),
            title: self.title.clone(),
            filename: self.filename.clone(),
            pages: self.pages.get().copied(),
            category: self.category,
            outline_entries: self.outline_entries.get().copied(),
            description: self.description.clone(),
        }
    }
}

/// Opens specification documents by id.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn open(&self, spec: &str) -> Result<Arc<dyn DocumentPort>>;
}

/// Specifications discovered in a directory.
#[derive(Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    /// Scan `dir` (not recursively) for `*.json` dumps with a known name.
    ///
    /// Files are visited in name order; the first file matching a pattern
    /// claims its id.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut registry = Registry::default();
        let mut scanned = 0;

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                SpecIndexError::io(dir, source)
            })?;

            if !entry.file_type().is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.to_lowercase().ends_with(".json") {
                continue;
            }
            scanned += 1;

            let Some(pattern) = SPEC_PATTERNS.iter().find(|p| p.pattern.is_match(&filename)) else {
                debug!(file = %filename, "Skipping unrecognized document");
                continue;
            };

            if registry.is_available(pattern.id) {
                debug!(spec = pattern.id, file = %filename, "Duplicate match, keeping first");
                continue;
            }

            registry.entries.push(RegistryEntry {
                path: entry.path().to_path_buf(),
                id: pattern.id,
                filename,
                title: pattern.title.to_string(),
                category: pattern.category,
                description: pattern.description.to_string(),
                pages: OnceLock::new(),
                outline_entries: OnceLock::new(),
            });
        }

        info!(
            specs = registry.entries.len(),
            files = scanned,
            dir = %dir.display(),
            "Discovered specifications"
        );

        Ok(registry)
    }

    /// Spec ids in discovery order.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn is_available(&self, spec: &str) -> bool {
        self.entry(spec).is_some()
    }

    fn entry(&self, spec: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.id == spec)
    }

    fn not_found(&self, spec: &str) -> SpecIndexError {
        let available = self.ids().join(", ");
        SpecIndexError::SpecNotFound {
            spec: spec.to_string(),
            available: if available.is_empty() {
                "(none)".to_string()
            } else {
                available
            },
        }
    }

    /// Path of a spec's document dump.
    pub fn spec_path(&self, spec: &str) -> Result<&Path> {
        self.entry(spec)
            .map(|e| e.path.as_path())
            .ok_or_else(|| self.not_found(spec))
    }

    pub fn spec_info(&self, spec: &str) -> Option<SpecInfo> {
        self.entry(spec).map(RegistryEntry::info)
    }

    /// Use `spec` if given, `default` otherwise; the id must be registered.
    pub fn resolve(&self, spec: Option<&str>, default: &str) -> Result<String> {
        let id = spec.unwrap_or(default);
        if self.is_available(id) {
            Ok(id.to_string())
        } else {
            Err(self.not_found(id))
        }
    }

    /// All specs, optionally restricted to one category.
    pub fn list_specs(&self, category: Option<SpecCategory>) -> Vec<SpecInfo> {
        self.entries
            .iter()
            .filter(|e| category.is_none_or(|c| e.category == c))
            .map(RegistryEntry::info)
            .collect()
    }

    /// Record runtime metadata. Values already recorded are kept.
    pub fn enrich(&self, spec: &str, pages: Option<usize>, outline_entries: Option<usize>) {
        if let Some(entry) = self.entry(spec) {
            if let Some(pages) = pages {
                let _ = entry.pages.set(pages);
            }
            if let Some(count) = outline_entries {
                let _ = entry.outline_entries.set(count);
            }
        }
    }
}

#[async_trait]
impl DocumentLoader for Registry {
    async fn open(&self, spec: &str) -> Result<Arc<dyn DocumentPort>> {
        let path = self.spec_path(spec)?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| SpecIndexError::io(path, e))?;

        let mut doc = MemoryDocument::from_json_slice(&data)?;
        if doc.name.is_empty() {
            doc.name = spec.to_string();
        }
        doc.path = Some(path.to_path_buf());

        info!(spec, pages = doc.pages.len(), "Opened document");
        Ok(Arc::new(doc))
    }
}
