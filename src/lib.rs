//! Spec Indexer - a query engine over tagged technical specifications.
//!
//! Documents are read through the [`DocumentPort`] trait: outline,
//! destinations, per-page structure trees and text runs. From those the
//! crate builds a section index, extracts structured section content, and
//! answers full-text search, requirement, definition, table and
//! version-comparison queries.
//!
//! # Quick Start
//!
//! ```no_run
//! use spec_indexer::{Config, SpecService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::with_documents_dir("specs");
//!     let service = SpecService::from_config(config)?;
//!
//!     let structure = service.get_structure(None, Some(2)).await?;
//!     println!("{} ({} sections)", structure.title, structure.total_sections);
//!
//!     let section = service.get_section(None, "7.3.4").await?;
//!     println!("{}: {} elements", section.title, section.content.len());
//!
//!     let hits = service.search(None, "cross-reference stream", Some(5)).await?;
//!     for hit in hits.results {
//!         println!("{} p.{}: {}", hit.section, hit.page, hit.snippet);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **DocumentPort**: read access to one tagged document
//! - **Registry**: discovers document dumps and opens them by spec id
//! - **SectionIndex**: outline tree plus depth-first section list with page ranges
//! - **SpecService**: owns the caches and lazily built per-spec indices

pub mod cache;
pub mod compare;
pub mod concurrency;
pub mod config;
pub mod content;
pub mod definitions;
pub mod document;
pub mod error;
pub mod outline;
pub mod registry;
pub mod requirements;
pub mod search;
pub mod service;
pub mod tables;
pub mod text;

// Re-export commonly used types
pub use compare::VersionComparison;
pub use config::Config;
pub use content::ContentElement;
pub use document::{DocumentPort, MemoryDocument};
pub use error::{Result, SpecIndexError};
pub use outline::{OutlineEntry, SectionIndex, SectionInfo};
pub use registry::{DocumentLoader, Registry, SpecCategory, SpecInfo};
pub use requirements::{Requirement, RequirementLevel};
pub use service::SpecService;
