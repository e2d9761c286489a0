//! Spec Indexer CLI
//!
//! Query sections, content, requirements, definitions and tables of tagged
//! specification documents.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use spec_indexer::{config::Config, content::ContentElement, service::SpecService};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Spec Indexer - query engine over tagged technical specifications
#[derive(Parser)]
#[command(name = "spec-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the document dumps (overrides SPEC_INDEXER_DIR)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Spec id to query (defaults to the configured default spec)
    #[arg(short, long, global = true)]
    spec: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available specifications
    List {
        /// Only list one category (standard, ts, pdfua, guide, appnote)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show the section tree of a specification
    Structure {
        /// Maximum depth to display (1-10)
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Show information about a specification
    Info,

    /// Show the content of a section
    Section {
        /// Section number, annex key or title (e.g. "7.3.4", "Annex A", "A")
        section: String,
    },

    /// Full-text search
    Search {
        /// The search query
        query: String,

        /// Number of results to return (1-50)
        #[arg(short = 'k', long)]
        max_results: Option<usize>,
    },

    /// Extract normative requirements
    Requirements {
        /// Restrict to a section and its subsections
        #[arg(long)]
        section: Option<String>,

        /// Restrict to one level (shall, shall not, should, should not, may)
        #[arg(long)]
        level: Option<String>,
    },

    /// List glossary definitions
    Definitions {
        /// Only show definitions mentioning this term
        term: Option<String>,
    },

    /// List the tables of a section
    Tables {
        /// Section number
        section: String,

        /// Only show the table at this index
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Compare the sections of the older and newer versions
    Compare {
        /// Restrict to a section subtree
        section: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(dir) = cli.dir {
        config.documents.dir = Some(dir);
    }
    let service = SpecService::from_config(config).context("Failed to open documents")?;

    let spec = cli.spec.as_deref();
    let json = cli.json;

    match cli.command {
        Commands::List { category } => cmd_list(&service, category.as_deref(), json),
        Commands::Structure { depth } => cmd_structure(&service, spec, depth, json).await,
        Commands::Info => cmd_info(&service, spec).await,
        Commands::Section { section } => cmd_section(&service, spec, &section, json).await,
        Commands::Search { query, max_results } => {
            cmd_search(&service, spec, &query, max_results, json).await
        }
        Commands::Requirements { section, level } => {
            cmd_requirements(&service, spec, section.as_deref(), level.as_deref(), json).await
        }
        Commands::Definitions { term } => {
            cmd_definitions(&service, spec, term.as_deref(), json).await
        }
        Commands::Tables { section, index } => {
            cmd_tables(&service, spec, &section, index, json).await
        }
        Commands::Compare { section } => cmd_compare(&service, section.as_deref(), json).await,
    }
}

/// Logs go to stderr; stdout carries only results.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

fn cmd_list(service: &SpecService, category: Option<&str>, json: bool) -> Result<()> {
    let result = service.list_specs(category)?;
    if json {
        return print_json(&result);
    }

    println!("Available specifications ({})", result.total_specs);
    println!("{}", "─".repeat(60));
    for spec in &result.specs {
        println!("  {:<12} {:<9} {}", spec.id, spec.category.as_str(), spec.title);
        println!("  {:<12} {:<9} {}", "", "", spec.filename);
    }

    Ok(())
}

async fn cmd_structure(
    service: &SpecService,
    spec: Option<&str>,
    depth: Option<usize>,
    json: bool,
) -> Result<()> {
    let start = Instant::now();
    let result = service
        .get_structure(spec, depth)
        .await
        .context("Failed to read structure")?;

    if json {
        return print_json(&result);
    }

    println!("{} ({} pages)", result.title, result.total_pages);
    println!("{}", "─".repeat(60));
    for entry in &result.sections {
        print!("{}", entry.format_tree(0));
    }
    println!("{}", "─".repeat(60));
    println!("{} sections in {:.2?}", result.total_sections, start.elapsed());

    Ok(())
}

async fn cmd_info(service: &SpecService, spec: Option<&str>) -> Result<()> {
    let id = service
        .registry()
        .resolve(spec, &service.config().documents.default_spec)?;

    let start = Instant::now();
    let index = service
        .section_index(&id)
        .await
        .context("Failed to build section index")?;
    let elapsed = start.elapsed();

    let info = service
        .registry()
        .spec_info(&id)
        .context("Specification disappeared from the registry")?;

    println!("Specification Information");
    println!("{}", "─".repeat(40));
    println!("  Id:              {}", info.id);
    println!("  Title:           {}", info.title);
    println!("  File:            {}", info.filename);
    println!("  Category:        {}", info.category);
    println!("  Total pages:     {}", index.total_pages);
    println!("  Sections:        {}", index.len());
    println!("  Outline entries: {}", info.outline_entries.unwrap_or(0));
    println!("  Max depth:       {}", index.max_depth());
    println!("  Index time:      {:.2?}", elapsed);
    println!("  Description:     {}", info.description);

    Ok(())
}

async fn cmd_section(service: &SpecService, spec: Option<&str>, section: &str, json: bool) -> Result<()> {
    let result = service.get_section(spec, section).await?;
    if json {
        return print_json(&result);
    }

    println!(
        "{} {} [pages {}-{}]",
        result.section_number, result.title, result.page_range.start, result.page_range.end
    );
    println!("{}", "─".repeat(60));
    for element in &result.content {
        print_element(element);
    }

    Ok(())
}

fn print_element(element: &ContentElement) {
    match element {
        ContentElement::Heading { level, text } => {
            println!("\n{} {}\n", "#".repeat(usize::from(*level).max(1)), text)
        }
        ContentElement::Paragraph { text } => println!("{}\n", text),
        ContentElement::List { items } => {
            for item in items {
                println!("  • {}", item);
            }
            println!();
        }
        ContentElement::Table { headers, rows } => {
            if !headers.is_empty() {
                println!("| {} |", headers.join(" | "));
            }
            for row in rows {
                println!("| {} |", row.join(" | "));
            }
            println!();
        }
        ContentElement::Note { label, text } => println!("{}: {}\n", label, text),
        ContentElement::Code { text } => println!("```\n{}\n```\n", text),
    }
}

async fn cmd_search(
    service: &SpecService,
    spec: Option<&str>,
    query: &str,
    max_results: Option<usize>,
    json: bool,
) -> Result<()> {
    let start = Instant::now();
    let result = service
        .search(spec, query, max_results)
        .await
        .context("Search failed")?;
    let elapsed = start.elapsed();

    if json {
        return print_json(&result);
    }

    println!("Searching for: \"{}\"\n", result.query);
    if result.results.is_empty() {
        println!("No matching pages found.");
        return Ok(());
    }

    println!("Results:");
    println!("{}", "─".repeat(60));
    for (i, hit) in result.results.iter().enumerate() {
        println!(
            "{:>2}. {} {} [page {}] (score {})",
            i + 1,
            hit.section,
            hit.title,
            hit.page,
            hit.score
        );
        println!("    {}", hit.snippet);
        println!();
    }
    println!("{}", "─".repeat(60));
    println!("Found {} results in {:.2?}", result.total_results, elapsed);

    Ok(())
}

async fn cmd_requirements(
    service: &SpecService,
    spec: Option<&str>,
    section: Option<&str>,
    level: Option<&str>,
    json: bool,
) -> Result<()> {
    let start = Instant::now();
    let result = service
        .get_requirements(spec, section, level)
        .await
        .context("Failed to extract requirements")?;

    if json {
        return print_json(&result);
    }

    println!(
        "Requirements (section: {}, level: {})",
        result.filter.section, result.filter.level
    );
    println!("{}", "─".repeat(60));
    for req in &result.requirements {
        println!("{:<16} [{}] {}", req.id, req.level, req.text);
    }
    println!("{}", "─".repeat(60));
    for (level, count) in &result.statistics {
        println!("  {:<12} {}", level, count);
    }
    println!(
        "{} requirements in {:.2?}",
        result.total_requirements,
        start.elapsed()
    );

    Ok(())
}

async fn cmd_definitions(service: &SpecService, spec: Option<&str>, term: Option<&str>, json: bool) -> Result<()> {
    let result = service
        .get_definitions(spec, term)
        .await
        .context("Failed to extract definitions")?;

    if json {
        return print_json(&result);
    }

    for def in &result.definitions {
        println!("{} {}", def.section, def.term);
        println!("    {}", def.definition);
        for note in def.notes.iter().flatten() {
            println!("    {}", note);
        }
        if let Some(source) = &def.source {
            println!("    [SOURCE: {}]", source);
        }
        println!();
    }
    println!("{} definitions", result.total_definitions);

    Ok(())
}

async fn cmd_tables(
    service: &SpecService,
    spec: Option<&str>,
    section: &str,
    index: Option<usize>,
    json: bool,
) -> Result<()> {
    let result = service.get_tables(spec, section, index).await?;
    if json {
        return print_json(&result);
    }

    println!("{} {} ({} tables)", result.section, result.section_title, result.total_tables);
    println!("{}", "─".repeat(60));
    for table in &result.tables {
        println!(
            "[{}] {}",
            table.index,
            table.caption.as_deref().unwrap_or("(no caption)")
        );
        print_element(&ContentElement::Table {
            headers: table.headers.clone(),
            rows: table.rows.clone(),
        });
    }

    Ok(())
}

async fn cmd_compare(service: &SpecService, section: Option<&str>, json: bool) -> Result<()> {
    let start = Instant::now();
    let result = service
        .compare_versions(section)
        .await
        .context("Version comparison failed")?;

    if json {
        return print_json(&result);
    }

    print!("{}", result.format());
    println!("Compared in {:.2?}", start.elapsed());

    Ok(())
}
