//! Query service over the registered specifications.
//!
//! [`SpecService`] owns every cache: open documents and extracted section
//! content in LRU caches, and per-spec indices that are built on first use
//! and shared by all later callers. A failed build leaves its slot empty, so
//! the next call retries it.

use crate::cache::{BoundedCache, CacheStats, ContentKey};
use crate::compare::{compare_sections, VersionComparison};
use crate::concurrency::map_concurrent;
use crate::config::Config;
use crate::content::{extract_section_content, ContentElement};
use crate::definitions::{filter_definitions, parse_definition_entry, parse_glossary_content, Definition};
use crate::document::DocumentPort;
use crate::error::{Result, SpecIndexError};
use crate::outline::{build_section_index, prune_tree, resolve_outline, OutlineEntry, SectionIndex, SectionInfo};
use crate::registry::{DocumentLoader, Registry, SpecCategory, SpecInfo};
use crate::requirements::{extract_requirements, level_statistics, Requirement, RequirementLevel};
use crate::search::{build_text_index, SearchHit, TextIndex};
use crate::tables::{collect_tables, select_table, TableInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Maximum query length in characters.
pub const MAX_QUERY_LEN: usize = 500;
/// Maximum definition search term length in characters.
pub const MAX_TERM_LEN: usize = 200;
pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const MAX_RESULTS_LIMIT: usize = 50;
pub const MAX_DEPTH_LIMIT: usize = 10;
/// Suggestions offered when a section is not found.
const SUGGESTION_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureResult {
    pub title: String,
    pub total_pages: usize,
    pub total_sections: usize,
    pub sections: Vec<OutlineEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResult {
    pub section_number: String,
    pub title: String,
    pub page_range: PageRange,
    pub content: Vec<ContentElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementsFilter {
    pub section: String,
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsResult {
    pub filter: RequirementsFilter,
    pub total_requirements: usize,
    pub statistics: BTreeMap<String, usize>,
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionsResult {
    pub total_definitions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablesResult {
    pub section: String,
    pub section_title: String,
    pub total_tables: usize,
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSpecsResult {
    pub total_specs: usize,
    pub specs: Vec<SpecInfo>,
}

/// Lazily built indices of one spec.
#[derive(Default)]
struct SpecIndices {
    sections: OnceCell<Arc<SectionIndex>>,
    search: OnceCell<Arc<TextIndex>>,
    requirements: OnceCell<Arc<Vec<Requirement>>>,
    definitions: OnceCell<Arc<Vec<Definition>>>,
}

/// Queries over the registered specifications.
pub struct SpecService {
    config: Config,
    registry: Arc<Registry>,
    loader: Arc<dyn DocumentLoader>,
    documents: BoundedCache<String, Arc<dyn DocumentPort>>,
    contents: BoundedCache<ContentKey, Arc<Vec<ContentElement>>>,
    indices: Mutex<HashMap<String, Arc<SpecIndices>>>,
    comparison: OnceCell<Arc<VersionComparison>>,
}

impl SpecService {
    /// Create a service reading documents through `loader`.
    pub fn new(config: Config, registry: Arc<Registry>, loader: Arc<dyn DocumentLoader>) -> Self {
        let documents = BoundedCache::new("documents", config.cache.max_documents);
        let contents = BoundedCache::new("section-content", config.cache.section_content);
        Self {
            config,
            registry,
            loader,
            documents,
            contents,
            indices: Mutex::new(HashMap::new()),
            comparison: OnceCell::new(),
        }
    }

    /// Create a service over the configured documents directory.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(Registry::discover(config.documents_dir()?)?);
        Ok(Self::new(config, registry.clone(), registry))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Statistics of the document and section-content caches.
    pub fn cache_stats(&self) -> (CacheStats, CacheStats) {
        (self.documents.stats(), self.contents.stats())
    }

    fn resolve_spec(&self, spec: Option<&str>) -> Result<String> {
        self.registry.resolve(spec, &self.config.documents.default_spec)
    }

    fn indices(&self, spec: &str) -> Arc<SpecIndices> {
        let mut indices = self.indices.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(indices.entry(spec.to_string()).or_default())
    }

    /// Open a document, or reuse it if still cached.
    async fn document(&self, spec: &str) -> Result<Arc<dyn DocumentPort>> {
        let key = spec.to_string();
        if let Some(doc) = self.documents.get(&key) {
            return Ok(doc);
        }

        let doc = self.loader.open(spec).await?;
        self.registry.enrich(spec, Some(doc.page_count()), None);
        self.documents.put(key, Arc::clone(&doc));
        Ok(doc)
    }

    /// Section index of a spec, built on first use.
    pub async fn section_index(&self, spec: &str) -> Result<Arc<SectionIndex>> {
        let indices = self.indices(spec);
        let index = indices
            .sections
            .get_or_try_init(|| self.build_section_index(spec))
            .await?;
        Ok(Arc::clone(index))
    }

    async fn build_section_index(&self, spec: &str) -> Result<Arc<SectionIndex>> {
        let start = Instant::now();
        let doc = self.document(spec).await?;
        let outline = resolve_outline(doc.as_ref()).await?;
        let entries: usize = outline.iter().map(OutlineEntry::node_count).sum();
        let index = build_section_index(outline, doc.page_count());

        self.registry.enrich(spec, Some(index.total_pages), Some(entries));
        info!(
            spec,
            sections = index.len(),
            pages = index.total_pages,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built section index"
        );
        Ok(Arc::new(index))
    }

    fn find_section<'a>(index: &'a SectionIndex, section: &str) -> Result<&'a SectionInfo> {
        index
            .find_section(section)
            .ok_or_else(|| SpecIndexError::SectionNotFound {
                section: section.to_string(),
                suggestions: index.find_similar_sections(section, SUGGESTION_LIMIT),
            })
    }

    /// Content of one section, served from the content cache when possible.
    async fn section_content(&self, spec: &str, info: &SectionInfo) -> Result<Arc<Vec<ContentElement>>> {
        let key = ContentKey {
            spec: spec.to_string(),
            section: info.section_number.clone(),
            start_page: info.page,
            end_page: info.end_page,
        };
        if let Some(content) = self.contents.get(&key) {
            return Ok(content);
        }

        let doc = self.document(spec).await?;
        let content = extract_section_content(
            doc.as_ref(),
            info.page,
            info.end_page,
            Some(info.section_number.as_str()),
            self.config.concurrency.content_pages,
        )
        .await?;

        debug!(%key, elements = content.len(), "Extracted section content");
        let content = Arc::new(content);
        self.contents.put(key, Arc::clone(&content));
        Ok(content)
    }

    /// Outline of a spec, optionally pruned to `max_depth` levels.
    pub async fn get_structure(&self, spec: Option<&str>, max_depth: Option<usize>) -> Result<StructureResult> {
        let max_depth = validate_max_depth(max_depth)?;
        let spec = self.resolve_spec(spec)?;
        let index = self.section_index(&spec).await?;

        let sections = match max_depth {
            Some(depth) => prune_tree(&index.tree, depth),
            None => index.tree.clone(),
        };

        let title = self
            .registry
            .spec_info(&spec)
            .map(|info| info.title)
            .unwrap_or_else(|| spec.clone());

        Ok(StructureResult {
            title,
            total_pages: index.total_pages,
            total_sections: index.len(),
            sections,
        })
    }

    /// Structured content of one section.
    pub async fn get_section(&self, spec: Option<&str>, section: &str) -> Result<SectionResult> {
        validate_section(section)?;
        let spec = self.resolve_spec(spec)?;
        let index = self.section_index(&spec).await?;
        let info = Self::find_section(&index, section)?;
        let content = self.section_content(&spec, info).await?;

        Ok(SectionResult {
            section_number: info.section_number.clone(),
            title: info.title.clone(),
            page_range: PageRange {
                start: info.page,
                end: info.end_page,
            },
            content: content.as_ref().clone(),
        })
    }

    /// Full-text search.
    pub async fn search(&self, spec: Option<&str>, query: &str, max_results: Option<usize>) -> Result<SearchResult> {
        validate_query(query)?;
        let max_results = validate_max_results(max_results)?;
        let spec = self.resolve_spec(spec)?;
        let sections = self.section_index(&spec).await?;

        let indices = self.indices(&spec);
        let text_index = indices
            .search
            .get_or_try_init(|| self.build_search_index(&spec, &sections))
            .await?;

        let results = text_index.search(query, &sections, max_results);
        Ok(SearchResult {
            query: query.to_string(),
            total_results: results.len(),
            results,
        })
    }

    async fn build_search_index(&self, spec: &str, sections: &SectionIndex) -> Result<Arc<TextIndex>> {
        info!(spec, "Building search index");
        let doc = self.document(spec).await?;
        let index = build_text_index(doc.as_ref(), sections, self.config.concurrency.search_pages).await?;
        Ok(Arc::new(index))
    }

    /// Normative requirements, optionally limited to a section subtree and a level.
    ///
    /// With a section, requirements are extracted from the leaf sections of
    /// that subtree. Without one, the whole-document index is used.
    pub async fn get_requirements(
        &self,
        spec: Option<&str>,
        section: Option<&str>,
        level: Option<&str>,
    ) -> Result<RequirementsResult> {
        if let Some(section) = section {
            validate_section(section)?;
        }
        let level = validate_level(level)?;
        let spec = self.resolve_spec(spec)?;

        let all = match section {
            Some(section) => self.section_requirements(&spec, section).await?,
            None => {
                let indices = self.indices(&spec);
                let cached = indices
                    .requirements
                    .get_or_try_init(|| self.build_requirements_index(&spec))
                    .await?;
                cached.as_ref().clone()
            }
        };

        let requirements: Vec<Requirement> = match level {
            Some(level) => all.into_iter().filter(|r| r.level == level).collect(),
            None => all,
        };

        Ok(RequirementsResult {
            filter: RequirementsFilter {
                section: section.unwrap_or("all").to_string(),
                level: level.map(|l| l.to_string()).unwrap_or_else(|| "all".to_string()),
            },
            total_requirements: requirements.len(),
            statistics: level_statistics(&requirements),
            requirements,
        })
    }

    async fn section_requirements(&self, spec: &str, section: &str) -> Result<Vec<Requirement>> {
        let index = self.section_index(spec).await?;
        let prefix = format!("{}.", section);

        let matching: Vec<&SectionInfo> = index
            .flat_order
            .iter()
            .filter(|s| s.section_number == section || s.section_number.starts_with(&prefix))
            .collect();

        if matching.is_empty() {
            return Err(SpecIndexError::SectionNotFound {
                section: section.to_string(),
                suggestions: index.find_similar_sections(section, SUGGESTION_LIMIT),
            });
        }

        // Parents' page ranges overlap their children's
        let leaves = matching.iter().filter(|s| {
            !s.children
                .iter()
                .any(|child| matching.iter().any(|m| &m.section_number == child))
        });

        let mut requirements = Vec::new();
        for info in leaves {
            let content = self.section_content(spec, info).await?;
            requirements.extend(extract_requirements(&content, &info.section_number, &info.title));
        }
        Ok(requirements)
    }

    async fn build_requirements_index(&self, spec: &str) -> Result<Arc<Vec<Requirement>>> {
        let start = Instant::now();
        let index = self.section_index(spec).await?;
        info!(spec, sections = index.len(), "Building requirements index");

        let sections: Vec<&SectionInfo> = index.flat_order.iter().collect();
        let per_section = map_concurrent(sections, self.config.concurrency.content_pages, |info, _| async move {
            match self.section_content(spec, info).await {
                Ok(content) => Ok(Some(extract_requirements(&content, &info.section_number, &info.title))),
                Err(e) => {
                    warn!(spec, section = %info.section_number, error = %e, "Skipping section");
                    Ok(None)
                }
            }
        })
        .await?;

        let skipped = per_section.iter().filter(|r| r.is_none()).count();
        let requirements: Vec<Requirement> = per_section.into_iter().flatten().flatten().collect();

        info!(
            spec,
            requirements = requirements.len(),
            skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built requirements index"
        );
        Ok(Arc::new(requirements))
    }

    /// Glossary definitions, optionally filtered by a search term.
    pub async fn get_definitions(&self, spec: Option<&str>, term: Option<&str>) -> Result<DefinitionsResult> {
        if let Some(term) = term {
            validate_term(term)?;
        }
        let spec = self.resolve_spec(spec)?;

        let indices = self.indices(&spec);
        let all = indices
            .definitions
            .get_or_try_init(|| self.build_definitions(&spec))
            .await?;

        let definitions = match term {
            Some(term) => filter_definitions(all, term),
            None => all.as_ref().clone(),
        };

        Ok(DefinitionsResult {
            total_definitions: definitions.len(),
            search_term: term.map(str::to_string),
            definitions,
        })
    }

    async fn build_definitions(&self, spec: &str) -> Result<Arc<Vec<Definition>>> {
        let key = self.config.glossary_section.as_str();
        let index = self.section_index(spec).await?;

        let Some(glossary) = index.get(key) else {
            return Err(SpecIndexError::UnsupportedOperation(format!(
                "Specification \"{}\" has no section {} to read definitions from",
                spec, key
            )));
        };

        let definitions = if glossary.children.is_empty() {
            let content = self.section_content(spec, glossary).await?;
            parse_glossary_content(key, &content)
        } else {
            let mut definitions = Vec::new();
            for child in glossary.children.iter().filter_map(|c| index.get(c)) {
                let content = self.section_content(spec, child).await?;
                definitions.extend(parse_definition_entry(&child.section_number, &child.title, &content));
            }
            definitions
        };

        if definitions.is_empty() {
            return Err(SpecIndexError::UnsupportedOperation(format!(
                "Section {} of \"{}\" does not contain definitions in a supported layout",
                key, spec
            )));
        }

        info!(spec, definitions = definitions.len(), "Extracted definitions");
        Ok(Arc::new(definitions))
    }

    /// Tables of a section, or one of them when `table_index` is given.
    pub async fn get_tables(
        &self,
        spec: Option<&str>,
        section: &str,
        table_index: Option<usize>,
    ) -> Result<TablesResult> {
        let result = self.get_section(spec, section).await?;
        let tables = collect_tables(&result.content);

        let tables = match table_index {
            Some(index) => vec![select_table(tables, index, section)?],
            None => tables,
        };

        Ok(TablesResult {
            section: result.section_number,
            section_title: result.title,
            total_tables: tables.len(),
            tables,
        })
    }

    /// Section correlation between the configured older and newer versions.
    pub async fn compare_versions(&self, section: Option<&str>) -> Result<VersionComparison> {
        if let Some(section) = section {
            validate_section(section)?;
        }
        let older = self.resolve_spec(Some(self.config.compare_older.as_str()))?;
        let newer = self.resolve_spec(Some(self.config.compare_newer.as_str()))?;

        let full = self
            .comparison
            .get_or_try_init(|| self.build_comparison(&older, &newer))
            .await?;

        Ok(match section {
            Some(section) => full.filter(section),
            None => full.as_ref().clone(),
        })
    }

    async fn build_comparison(&self, older: &str, newer: &str) -> Result<Arc<VersionComparison>> {
        let (older, newer) = futures::try_join!(self.section_index(older), self.section_index(newer))?;
        Ok(Arc::new(compare_sections(&older, &newer)))
    }

    /// Registered specs, optionally of one category.
    pub fn list_specs(&self, category: Option<&str>) -> Result<ListSpecsResult> {
        let category = category.map(str::parse::<SpecCategory>).transpose()?;
        let specs = self.registry.list_specs(category);
        Ok(ListSpecsResult {
            total_specs: specs.len(),
            specs,
        })
    }
}

fn validate_section(section: &str) -> Result<()> {
    if section.trim().is_empty() {
        return Err(SpecIndexError::InvalidArgument("Section must not be empty".to_string()));
    }
    Ok(())
}

fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(SpecIndexError::InvalidArgument("Query must not be empty".to_string()));
    }
    if query.chars().count() > MAX_QUERY_LEN {
        return Err(SpecIndexError::InvalidArgument(format!(
            "Query too long (max {} characters)",
            MAX_QUERY_LEN
        )));
    }
    Ok(())
}

fn validate_term(term: &str) -> Result<()> {
    if term.trim().is_empty() {
        return Err(SpecIndexError::InvalidArgument("Term must not be empty".to_string()));
    }
    if term.chars().count() > MAX_TERM_LEN {
        return Err(SpecIndexError::InvalidArgument(format!(
            "Term too long (max {} characters)",
            MAX_TERM_LEN
        )));
    }
    Ok(())
}

fn validate_max_results(max_results: Option<usize>) -> Result<usize> {
    match max_results {
        None => Ok(DEFAULT_MAX_RESULTS),
        Some(n) if (1..=MAX_RESULTS_LIMIT).contains(&n) => Ok(n),
        Some(n) => Err(SpecIndexError::InvalidArgument(format!(
            "max_results must be an integer between 1 and {}, got {}",
            MAX_RESULTS_LIMIT, n
        ))),
    }
}

fn validate_max_depth(max_depth: Option<usize>) -> Result<Option<usize>> {
    match max_depth {
        Some(n) if !(1..=MAX_DEPTH_LIMIT).contains(&n) => Err(SpecIndexError::InvalidArgument(format!(
            "max_depth must be an integer between 1 and {}, got {}",
            MAX_DEPTH_LIMIT, n
        ))),
        other => Ok(other),
    }
}

fn validate_level(level: Option<&str>) -> Result<Option<RequirementLevel>> {
    level
        .map(|l| {
            RequirementLevel::parse(l).ok_or_else(|| {
                let allowed: Vec<&str> = RequirementLevel::ALL.iter().map(|l| l.as_str()).collect();
                SpecIndexError::InvalidArgument(format!(
                    "level must be one of: {}, got \"{}\"",
                    allowed.join(", "),
                    l
                ))
            })
        })
        .transpose()
}
