//! Configuration for the spec indexer.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{Result, SpecIndexError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Where specification documents are found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Directory holding the document dumps.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Spec id used when a query names no spec.
    #[serde(default = "default_spec")]
    pub default_spec: String,
}

fn default_spec() -> String {
    "iso32000-2".to_string()
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            default_spec: default_spec(),
        }
    }
}

/// LRU cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of open documents kept resident.
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,

    /// Maximum number of extracted section contents kept.
    #[serde(default = "default_section_content")]
    pub section_content: usize,
}

fn default_max_documents() -> usize {
    5
}

fn default_section_content() -> usize {
    50
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
            section_content: default_section_content(),
        }
    }
}

/// Chunk sizes for the bounded-concurrency page scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Pages extracted concurrently for one section.
    #[serde(default = "default_content_pages")]
    pub content_pages: usize,

    /// Pages read concurrently while building the search index.
    #[serde(default = "default_search_pages")]
    pub search_pages: usize,
}

fn default_content_pages() -> usize {
    5
}

fn default_search_pages() -> usize {
    10
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            content_pages: default_content_pages(),
            search_pages: default_search_pages(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Document discovery settings
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Cache bounds
    #[serde(default)]
    pub cache: CacheConfig,

    /// Concurrency limits
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Section holding the terms and definitions
    #[serde(default = "default_glossary_section")]
    pub glossary_section: String,

    /// Older spec id for version comparison
    #[serde(default = "default_compare_older")]
    pub compare_older: String,

    /// Newer spec id for version comparison
    #[serde(default = "default_compare_newer")]
    pub compare_newer: String,
}

fn default_glossary_section() -> String {
    "3".to_string()
}

fn default_compare_older() -> String {
    "pdf17".to_string()
}

fn default_compare_newer() -> String {
    "iso32000-2".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents: DocumentsConfig::default(),
            cache: CacheConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            glossary_section: default_glossary_section(),
            compare_older: default_compare_older(),
            compare_newer: default_compare_newer(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (SPEC_INDEXER_DIR, SPEC_INDEXER_DEFAULT_SPEC, ...)
    /// 2. Config file (~/.config/spec-indexer/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Override fields from the process environment.
    fn apply_env(&mut self) {
        if let Ok(dir) = env::var("SPEC_INDEXER_DIR").or_else(|_| env::var("PDF_SPEC_DIR")) {
            self.documents.dir = Some(PathBuf::from(dir));
        }

        if let Ok(spec) = env::var("SPEC_INDEXER_DEFAULT_SPEC") {
            self.documents.default_spec = spec;
        }

        if let Some(n) = env_usize("SPEC_INDEXER_MAX_DOCUMENTS") {
            self.cache.max_documents = n;
        }

        if let Some(n) = env_usize("SPEC_INDEXER_SECTION_CACHE") {
            self.cache.section_content = n;
        }

        if let Some(n) = env_usize("SPEC_INDEXER_CONTENT_CONCURRENCY") {
            self.concurrency.content_pages = n;
        }

        if let Some(n) = env_usize("SPEC_INDEXER_SEARCH_CONCURRENCY") {
            self.concurrency.search_pages = n;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SpecIndexError::io(path, e))?;

        serde_yaml::from_str(&content)
            .map_err(|e| SpecIndexError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "spec-indexer")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_documents == 0 || self.cache.section_content == 0 {
            return Err(SpecIndexError::Config(
                "Cache sizes must be at least 1.".to_string(),
            ));
        }

        if self.concurrency.content_pages == 0 || self.concurrency.search_pages == 0 {
            return Err(SpecIndexError::Config(
                "Concurrency limits must be at least 1.".to_string(),
            ));
        }

        if self.glossary_section.trim().is_empty() {
            return Err(SpecIndexError::Config(
                "Glossary section must not be empty.".to_string(),
            ));
        }

        Ok(())
    }

    /// Document directory, or an error telling the user how to set it.
    pub fn documents_dir(&self) -> Result<&PathBuf> {
        self.documents.dir.as_ref().ok_or_else(|| {
            SpecIndexError::Config(
                "Document directory is required. Set SPEC_INDEXER_DIR environment variable or add documents.dir to config file.".to_string(),
            )
        })
    }

    /// Create a config pointing at a document directory (useful for testing).
    pub fn with_documents_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            documents: DocumentsConfig {
                dir: Some(dir.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.documents.dir.is_none());
        assert_eq!(config.documents.default_spec, "iso32000-2");
        assert_eq!(config.cache.max_documents, 5);
        assert_eq!(config.cache.section_content, 50);
        assert_eq!(config.concurrency.search_pages, 10);
        assert_eq!(config.glossary_section, "3");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.concurrency.search_pages = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.section_content = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_documents_dir_required() {
        assert!(Config::default().documents_dir().is_err());
        let config = Config::with_documents_dir("/tmp/specs");
        assert_eq!(config.documents_dir().unwrap(), &PathBuf::from("/tmp/specs"));
    }

    #[test]
    fn test_load_from_file_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "documents:\n  dir: /data/specs\ncache:\n  section_content: 10\nglossary_section: \"2\"\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.documents.dir, Some(PathBuf::from("/data/specs")));
        assert_eq!(config.documents.default_spec, "iso32000-2");
        assert_eq!(config.cache.section_content, 10);
        assert_eq!(config.cache.max_documents, 5);
        assert_eq!(config.glossary_section, "2");
    }

    #[test]
    fn test_load_from_file_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "cache: [not, a, map").unwrap();
        assert!(matches!(
            Config::load_from_file(&path),
            Err(SpecIndexError::Config(_))
        ));
    }
}
