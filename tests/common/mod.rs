//! Shared fixtures: two small tagged documents written as JSON dumps.

#![allow(dead_code)]

use async_trait::async_trait;
use spec_indexer::config::Config;
use spec_indexer::document::{Destination, DocumentPort, OutlineNode, PageData, StructNode, TextItem};
use spec_indexer::{DocumentLoader, MemoryDocument, Registry, Result, SpecIndexError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const NEWER_FILE: &str = "ISO_32000-2_sponsored-ec2.json";
pub const OLDER_FILE: &str = "PDF32000_2008.json";

/// Builds one tagged page, binding every leaf to its own marked-content span.
pub struct PageBuilder {
    tree: StructNode,
    runs: Vec<TextItem>,
    next_id: usize,
}

impl PageBuilder {
    pub fn new() -> Self {
        Self {
            tree: StructNode::new("Document"),
            runs: Vec::new(),
            next_id: 0,
        }
    }

    fn leaf(&mut self, role: &str, text: &str) -> StructNode {
        let id = format!("mc{}", self.next_id);
        self.next_id += 1;
        self.runs.push(TextItem::begin(&id));
        self.runs.push(TextItem::line(text));
        self.runs.push(TextItem::End);
        StructNode::new(role).content(id)
    }

    pub fn el(mut self, role: &str, text: &str) -> Self {
        let node = self.leaf(role, text);
        self.tree = self.tree.node(node);
        self
    }

    pub fn table(mut self, headers: &[&str], rows: &[&[&str]]) -> Self {
        let mut table = StructNode::new("Table");

        let mut header_row = StructNode::new("TR");
        for h in headers {
            header_row = header_row.node(self.leaf("TH", h));
        }
        table = table.node(header_row);

        for row in rows {
            let mut tr = StructNode::new("TR");
            for cell in *row {
                tr = tr.node(self.leaf("TD", cell));
            }
            table = table.node(tr);
        }

        self.tree = self.tree.node(table);
        self
    }

    pub fn build(self) -> PageData {
        PageData::new(Some(self.tree), self.runs)
    }
}

/// An untagged page holding plain text runs.
pub fn untagged_page(text: &str) -> PageData {
    PageData::new(None, vec![TextItem::line(text)])
}

/// Newer edition: subsection glossary, nested clauses, a table and an annex.
pub fn newer_document() -> MemoryDocument {
    let pages = vec![
        PageBuilder::new()
            .el("H1", "1 Scope")
            .el(
                "P",
                "This document specifies a digital form for representing documents. Conforming readers shall process all objects.",
            )
            .build(),
        PageBuilder::new()
            .el("H1", "3 Terms and definitions")
            .el("H2", "3.1 array")
            .el("P", "one-dimensional collection of objects arranged sequentially")
            .el("P", "NOTE 1 Arrays may be heterogeneous.")
            .build(),
        PageBuilder::new()
            .el("H2", "3.2 dictionary")
            .el("P", "associative table containing pairs of objects")
            .build(),
        PageBuilder::new()
            .el("H1", "7 Syntax")
            .el("H2", "7.1 General")
            .el("P", "This clause covers the syntax of the format.")
            .build(),
        PageBuilder::new()
            .el("H2", "7.2 Lexical conventions")
            .el(
                "P",
                "A conforming writer shall not use the null character in names. Writers should use white-space consistently.",
            )
            .el("P", "Table 1 — White-space characters")
            .table(&["Decimal", "Name"], &[&["0", "Null"], &["9", "Horizontal tab"]])
            .build(),
        PageBuilder::new()
            .el("H3", "7.2.1 Whitespace")
            .el(
                "P",
                "White-space characters may appear between tokens. The cross-reference stream shall begin with the xref keyword.",
            )
            .build(),
        PageBuilder::new()
            .el("H1", "Annex A (informative) Operator summary")
            .el("P", "The operator summary lists every operator.")
            .build(),
        untagged_page("Annex content continues with cross-reference stream notes."),
    ];

    MemoryDocument::new("ISO 32000-2", pages)
        .with_outline(vec![
            OutlineNode::new("1 Scope", 1),
            OutlineNode::new("3 Terms and definitions", 2)
                .with_child(OutlineNode::new("3.1 array", 2))
                .with_child(OutlineNode::new("3.2 dictionary", 3)),
            OutlineNode::new("7 Syntax", 4)
                .with_child(OutlineNode::new("7.1 General", 4))
                .with_child(
                    OutlineNode::new("7.2 Lexical conventions", 5)
                        .with_child(OutlineNode::new("7.2.1 Whitespace", 6)),
                ),
            OutlineNode::new("Annex A (informative) Operator summary", 7),
        ])
}

/// Older edition: flat glossary and a clause dropped in the newer one.
pub fn older_document() -> MemoryDocument {
    let pages = vec![
        PageBuilder::new()
            .el("H1", "1 Scope")
            .el("P", "This standard specifies the digital form.")
            .el("H1", "3 Terms and definitions")
            .el("P", "For the purposes of this document, the following terms apply.")
            .el("P", "array object")
            .el("P", "a one-dimensional collection of objects arranged sequentially.")
            .el("P", "dictionary object")
            .el("P", "an associative table containing pairs of objects.")
            .build(),
        PageBuilder::new()
            .el("H1", "7 Syntax")
            .el("H2", "7.1 General")
            .el("P", "This clause covers the syntax.")
            .el("H2", "7.2 Lexical conventions")
            .el("P", "Readers shall ignore comments.")
            .build(),
        PageBuilder::new()
            .el("H2", "7.3 Objects")
            .el("P", "Eight basic types of objects are supported.")
            .build(),
    ];

    MemoryDocument::new("PDF 1.7", pages).with_outline(vec![
        OutlineNode::new("1 Scope", 1),
        OutlineNode::new("3 Terms and definitions", 1),
        OutlineNode::new("7 Syntax", 2)
            .with_child(OutlineNode::new("7.1 General", 2))
            .with_child(OutlineNode::new("7.2 Lexical conventions", 2))
            .with_child(OutlineNode::new("7.3 Objects", 3)),
    ])
}

pub fn write_document(dir: &Path, filename: &str, doc: &MemoryDocument) {
    let json = serde_json::to_vec_pretty(doc).unwrap();
    std::fs::write(dir.join(filename), json).unwrap();
}

/// A directory holding both editions plus an unrelated file.
pub fn documents_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_document(dir.path(), NEWER_FILE, &newer_document());
    write_document(dir.path(), OLDER_FILE, &older_document());
    std::fs::write(dir.path().join("notes.json"), "{}").unwrap();
    dir
}

pub fn config_for(dir: &TempDir) -> Config {
    Config::with_documents_dir(dir.path())
}

/// Loader that counts opens and keeps every document it hands out.
pub struct CountingLoader {
    registry: Arc<Registry>,
    opens: AtomicUsize,
    opened: Mutex<Vec<Arc<MemoryDocument>>>,
}

impl CountingLoader {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            opens: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Most recently opened document.
    pub fn last_opened(&self) -> Arc<MemoryDocument> {
        self.opened.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl DocumentLoader for CountingLoader {
    async fn open(&self, spec: &str) -> Result<Arc<dyn DocumentPort>> {
        let path = self.registry.spec_path(spec)?;
        let doc = Arc::new(MemoryDocument::from_json_file(path)?);
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.opened.lock().unwrap().push(Arc::clone(&doc));
        Ok(doc)
    }
}

/// Loader whose first `failures` opens fail.
pub struct FlakyLoader {
    registry: Arc<Registry>,
    failures: usize,
    attempts: AtomicUsize,
}

impl FlakyLoader {
    pub fn new(registry: Arc<Registry>, failures: usize) -> Self {
        Self {
            registry,
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentLoader for FlakyLoader {
    async fn open(&self, spec: &str) -> Result<Arc<dyn DocumentPort>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(SpecIndexError::Document("device not ready".to_string()));
        }
        self.registry.open(spec).await
    }
}

/// Port over a [`MemoryDocument`] that counts structure-tree reads and can
/// fail on one page.
pub struct InstrumentedPort {
    inner: MemoryDocument,
    failing_page: Option<usize>,
    tree_reads: AtomicUsize,
}

impl InstrumentedPort {
    pub fn tree_reads(&self) -> usize {
        self.tree_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentPort for InstrumentedPort {
    fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    async fn outline(&self) -> Result<Option<Vec<OutlineNode>>> {
        self.inner.outline().await
    }

    async fn resolve_destination(&self, dest: &Destination) -> i64 {
        self.inner.resolve_destination(dest).await
    }

    async fn structure_tree(&self, page: usize) -> Result<Option<StructNode>> {
        self.tree_reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_page == Some(page) {
            return Err(SpecIndexError::Document(format!("corrupt content stream on page {}", page)));
        }
        self.inner.structure_tree(page).await
    }

    async fn text_runs(&self, page: usize) -> Result<Vec<TextItem>> {
        self.inner.text_runs(page).await
    }

    async fn make_current(&self) -> Result<()> {
        self.inner.make_current().await
    }
}

/// Loader handing out [`InstrumentedPort`]s.
pub struct InstrumentedLoader {
    registry: Arc<Registry>,
    failing_page: Option<usize>,
    ports: Mutex<Vec<Arc<InstrumentedPort>>>,
}

impl InstrumentedLoader {
    pub fn new(registry: Arc<Registry>, failing_page: Option<usize>) -> Self {
        Self {
            registry,
            failing_page,
            ports: Mutex::new(Vec::new()),
        }
    }

    /// Structure-tree reads across every port handed out.
    pub fn tree_reads(&self) -> usize {
        self.ports.lock().unwrap().iter().map(|p| p.tree_reads()).sum()
    }
}

#[async_trait]
impl DocumentLoader for InstrumentedLoader {
    async fn open(&self, spec: &str) -> Result<Arc<dyn DocumentPort>> {
        let path = self.registry.spec_path(spec)?;
        let port = Arc::new(InstrumentedPort {
            inner: MemoryDocument::from_json_file(path)?,
            failing_page: self.failing_page,
            tree_reads: AtomicUsize::new(0),
        });
        self.ports.lock().unwrap().push(Arc::clone(&port));
        Ok(port)
    }
}
