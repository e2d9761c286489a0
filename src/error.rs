//! Error types for the spec indexer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, SpecIndexError>;

/// Errors that can occur while indexing or querying a specification.
#[derive(Error, Debug)]
pub enum SpecIndexError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The requested section does not exist in the document.
    #[error("{}", section_not_found_message(.section, .suggestions))]
    SectionNotFound {
        section: String,
        suggestions: Vec<String>,
    },

    /// The requested specification is not registered.
    #[error("Specification \"{spec}\" not found. Available specs: {available}")]
    SpecNotFound { spec: String, available: String },

    /// The document does not support the requested operation.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A table index beyond the tables extracted for a section.
    #[error("table_index {index} out of range. Section \"{section}\" has {count} table(s).")]
    TableIndexOutOfRange {
        index: usize,
        section: String,
        count: usize,
    },

    /// A caller-supplied argument failed validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The document access port failed.
    #[error("Document access error: {0}")]
    Document(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SpecIndexError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means "the thing you asked for is not there".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SpecIndexError::SectionNotFound { .. } | SpecIndexError::SpecNotFound { .. }
        )
    }
}

fn section_not_found_message(section: &str, suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        format!(
            "Section \"{}\" not found. Use the structure view to see available sections.",
            section
        )
    } else {
        format!(
            "Section \"{}\" not found. Did you mean: {}?",
            section,
            suggestions.join(", ")
        )
    }
}

impl From<serde_json::Error> for SpecIndexError {
    fn from(err: serde_json::Error) -> Self {
        SpecIndexError::Serialization(err.to_string())
    }
}
