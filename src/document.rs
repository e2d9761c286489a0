//! Document access port.
//!
//! The indexers never parse document bytes themselves. They consume a
//! tagged document through [`DocumentPort`]: a page count, an outline with
//! resolvable destinations, a structure tree per page and a text-run stream
//! per page. [`MemoryDocument`] implements the port over a JSON dump of
//! those four things and is what the CLI and the tests load.

use crate::error::{Result, SpecIndexError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// An outline destination, either a direct 0-based page reference or a
/// named destination looked up in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    PageIndex(i64),
    Named(String),
}

/// A raw bookmark node as stored in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineNode {
    pub title: String,
    #[serde(default)]
    pub dest: Option<Destination>,
    #[serde(default, alias = "items")]
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    /// Create a bookmark pointing at a 1-based page.
    pub fn new(title: impl Into<String>, page: usize) -> Self {
        Self {
            title: title.into(),
            dest: Some(Destination::PageIndex(page as i64 - 1)),
            children: Vec::new(),
        }
    }

    /// Create a bookmark with no destination.
    pub fn unresolved(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            dest: None,
            children: Vec::new(),
        }
    }

    /// Add a child bookmark.
    pub fn with_child(mut self, child: OutlineNode) -> Self {
        self.children.push(child);
        self
    }
}

/// A node of a page's structure tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructNode {
    pub role: String,
    #[serde(default)]
    pub children: Vec<StructChild>,
}

/// Either a nested structure element or a reference to marked content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructChild {
    Content(ContentRef),
    Node(StructNode),
}

/// Leaf reference binding a structure element to marked content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRef {
    pub id: String,
}

impl StructNode {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            children: Vec::new(),
        }
    }

    /// Append a child element.
    pub fn node(mut self, child: StructNode) -> Self {
        self.children.push(StructChild::Node(child));
        self
    }

    /// Append a marked-content reference.
    pub fn content(mut self, id: impl Into<String>) -> Self {
        self.children
            .push(StructChild::Content(ContentRef { id: id.into() }));
        self
    }
}

/// One entry of a page's text stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextItem {
    /// A run of visible text.
    Run {
        text: String,
        #[serde(default)]
        ends_line: bool,
    },
    /// Start of a marked-content span.
    Begin {
        #[serde(default)]
        content_id: Option<String>,
    },
    /// End of the innermost marked-content span.
    End,
}

impl TextItem {
    pub fn run(text: impl Into<String>) -> Self {
        TextItem::Run {
            text: text.into(),
            ends_line: false,
        }
    }

    pub fn line(text: impl Into<String>) -> Self {
        TextItem::Run {
            text: text.into(),
            ends_line: true,
        }
    }

    pub fn begin(id: impl Into<String>) -> Self {
        TextItem::Begin {
            content_id: Some(id.into()),
        }
    }
}

/// Read access to a tagged document.
///
/// Page numbers are 1-based throughout. Implementations may keep hidden
/// per-process state about which document is "current"; callers that walk
/// every page must call [`DocumentPort::make_current`] first.
#[async_trait]
pub trait DocumentPort: Send + Sync {
    /// Total number of pages.
    fn page_count(&self) -> usize;

    /// Raw bookmark tree, `None` if the document has no outline.
    async fn outline(&self) -> Result<Option<Vec<OutlineNode>>>;

    /// Resolve a destination to a 1-based page, -1 when it cannot be resolved.
    async fn resolve_destination(&self, dest: &Destination) -> i64;

    /// Structure tree of a page, `None` for untagged pages.
    async fn structure_tree(&self, page: usize) -> Result<Option<StructNode>>;

    /// Text runs and marked-content boundaries of a page, in content order.
    async fn text_runs(&self, page: usize) -> Result<Vec<TextItem>>;

    /// Re-acquire this document as the port's current document.
    async fn make_current(&self) -> Result<()> {
        Ok(())
    }
}

/// Tagged data of one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageData {
    #[serde(default)]
    pub structure_tree: Option<StructNode>,
    #[serde(default)]
    pub text_runs: Vec<TextItem>,
}

impl PageData {
    pub fn new(structure_tree: Option<StructNode>, text_runs: Vec<TextItem>) -> Self {
        Self {
            structure_tree,
            text_runs,
        }
    }
}

/// A tagged document held entirely in memory.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Document name/title.
    #[serde(default)]
    pub name: String,
    /// Original file path (if loaded from file).
    #[serde(skip)]
    pub path: Option<PathBuf>,
    /// Pages in the document.
    #[serde(default)]
    pub pages: Vec<PageData>,
    /// Bookmark tree.
    #[serde(default)]
    pub outline: Option<Vec<OutlineNode>>,
    /// Named destinations mapped to 0-based page indices.
    #[serde(default)]
    pub destinations: HashMap<String, i64>,
    #[serde(skip)]
    activations: AtomicUsize,
}

impl MemoryDocument {
    /// Create a new document with given name and pages.
    pub fn new(name: impl Into<String>, pages: Vec<PageData>) -> Self {
        Self {
            name: name.into(),
            pages,
            ..Default::default()
        }
    }

    /// Attach a bookmark tree.
    pub fn with_outline(mut self, outline: Vec<OutlineNode>) -> Self {
        self.outline = Some(outline);
        self
    }

    /// Register a named destination pointing at a 1-based page.
    pub fn with_destination(mut self, name: impl Into<String>, page: usize) -> Self {
        self.destinations.insert(name.into(), page as i64 - 1);
        self
    }

    /// Parse a document from its JSON dump.
    pub fn from_json_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Load a document from a JSON dump on disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| SpecIndexError::io(path, e))?;
        let mut doc = Self::from_json_slice(&data)?;

        if doc.name.is_empty() {
            doc.name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("untitled")
                .to_string();
        }
        doc.path = Some(path.to_path_buf());

        Ok(doc)
    }

    /// How many times the document was made current.
    pub fn activation_count(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    fn page(&self, number: usize) -> Result<&PageData> {
        if number == 0 || number > self.pages.len() {
            Err(SpecIndexError::Document(format!(
                "Page {} out of range (document has {} pages)",
                number,
                self.pages.len()
            )))
        } else {
            Ok(&self.pages[number - 1])
        }
    }

    fn page_from_index(&self, index: i64) -> i64 {
        if index >= 0 && (index as usize) < self.pages.len() {
            index + 1
        } else {
            -1
        }
    }
}

#[async_trait]
impl DocumentPort for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    async fn outline(&self) -> Result<Option<Vec<OutlineNode>>> {
        Ok(self.outline.clone())
    }

    async fn resolve_destination(&self, dest: &Destination) -> i64 {
        match dest {
            Destination::PageIndex(index) => self.page_from_index(*index),
            Destination::Named(name) => self
                .destinations
                .get(name)
                .map(|index| self.page_from_index(*index))
                .unwrap_or(-1),
        }
    }

    async fn structure_tree(&self, page: usize) -> Result<Option<StructNode>> {
        Ok(self.page(page)?.structure_tree.clone())
    }

    async fn text_runs(&self, page: usize) -> Result<Vec<TextItem>> {
        Ok(self.page(page)?.text_runs.clone())
    }

    async fn make_current(&self) -> Result<()> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_json() -> &'static str {
        r#"{
            "name": "Sample",
            "pages": [
                {
                    "structure_tree": {
                        "role": "Document",
                        "children": [
                            { "role": "P", "children": [ { "id": "mc0" } ] }
                        ]
                    },
                    "text_runs": [
                        { "kind": "begin", "content_id": "mc0" },
                        { "kind": "run", "text": "Hello", "ends_line": true },
                        { "kind": "end" }
                    ]
                },
                { "text_runs": [ { "kind": "run", "text": "Plain" } ] }
            ],
            "outline": [
                { "title": "1 Scope", "dest": 0, "children": [
                    { "title": "1.1 General", "dest": "sec1.1" }
                ] }
            ],
            "destinations": { "sec1.1": 1 }
        }"#
    }

    #[tokio::test]
    async fn test_parse_json_dump() {
        let doc = MemoryDocument::from_json_slice(sample_json().as_bytes()).unwrap();
        assert_eq!(doc.page_count(), 2);

        let tree = doc.structure_tree(1).await.unwrap().unwrap();
        assert_eq!(tree.role, "Document");
        match &tree.children[0] {
            StructChild::Node(p) => {
                assert_eq!(p.role, "P");
                assert!(matches!(&p.children[0], StructChild::Content(c) if c.id == "mc0"));
            }
            other => panic!("unexpected child: {:?}", other),
        }

        assert!(doc.structure_tree(2).await.unwrap().is_none());
        let runs = doc.text_runs(1).await.unwrap();
        assert_eq!(runs[1], TextItem::line("Hello"));
    }

    #[tokio::test]
    async fn test_resolve_destinations() {
        let doc = MemoryDocument::from_json_slice(sample_json().as_bytes()).unwrap();
        assert_eq!(doc.resolve_destination(&Destination::PageIndex(0)).await, 1);
        assert_eq!(doc.resolve_destination(&Destination::PageIndex(7)).await, -1);
        assert_eq!(
            doc.resolve_destination(&Destination::Named("sec1.1".into())).await,
            2
        );
        assert_eq!(
            doc.resolve_destination(&Destination::Named("missing".into())).await,
            -1
        );
    }

    #[tokio::test]
    async fn test_page_out_of_range() {
        let doc = MemoryDocument::new("Empty", vec![PageData::default()]);
        assert!(doc.text_runs(0).await.is_err());
        assert!(doc.text_runs(2).await.is_err());
        assert!(doc.text_runs(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_make_current_is_counted() {
        let doc = MemoryDocument::new("Doc", Vec::new());
        doc.make_current().await.unwrap();
        doc.make_current().await.unwrap();
        assert_eq!(doc.activation_count(), 2);
    }

    #[test]
    fn test_from_json_file_names_document_after_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("PDF32000_2008.json");
        std::fs::write(&path, r#"{ "pages": [ {} ] }"#).unwrap();

        let doc = MemoryDocument::from_json_file(&path).unwrap();
        assert_eq!(doc.name, "PDF32000_2008");
        assert_eq!(doc.path.as_deref(), Some(path.as_path()));
        assert_eq!(doc.page_count(), 1);
    }
}
