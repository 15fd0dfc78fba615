//! Paper digest binary entry point.
//!
//! Answers research queries from the local paper store, refreshing it from
//! arXiv and Semantic Scholar when a query's cached results are stale. Supports
//! single-query and interactive REPL modes, with markdown, table or JSON output.
//!
//! # Examples
//!
//! Single query with default settings:
//! ```bash
//! paper-digest --query "graph neural networks"
//! ```
//!
//! JSON output against a throwaway in-memory store:
//! ```bash
//! paper-digest --ephemeral --query "diffusion models" --format json
//! ```
//!
//! Interactive mode with hybrid ranking:
//! ```bash
//! paper-digest --interactive --ranker hybrid
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use paper_digest::{
    config::{DigestConfig, RankerKind, SummarizerKind},
    digest::DisplayableResult,
    embedding::{fastembed::FastEmbedProvider, openai::OpenAIEmbedding, EmbeddingProvider},
    engine::ResearchEngine,
    models::DigestEntry,
    provider::{arxiv::ArxivProvider, semantic_scholar::SemanticScholarProvider},
    ranking::{HybridRanker, KeywordRanker, Ranker},
    storage::{memory::MemoryStorage, sqlite::SqliteStorage, PaperStorage},
    summarize::{openai::ChatSummarizer, ExtractiveSummarizer, Summarizer},
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wrapper enum for embedding providers to allow static dispatch in `HybridRanker`
enum DynamicEmbeddingProvider {
    FastEmbed(FastEmbedProvider),
    OpenAI(OpenAIEmbedding),
}

#[async_trait::async_trait]
impl EmbeddingProvider for DynamicEmbeddingProvider {
    async fn embed(&self, text: &str) -> paper_digest::embedding::EmbeddingResult<Vec<f32>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed(text).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed(text).await,
        }
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
    ) -> paper_digest::embedding::EmbeddingResult<Vec<Vec<f32>>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed_batch(texts).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed_batch(texts).await,
        }
    }

    fn dimension(&self) -> usize {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.dimension(),
            DynamicEmbeddingProvider::OpenAI(p) => p.dimension(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.model_name(),
            DynamicEmbeddingProvider::OpenAI(p) => p.model_name(),
        }
    }
}

/// Output format for digests
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Title, source and summary blocks
    Markdown,
    /// Human-friendly table
    Table,
    /// Machine-readable JSON format
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RankerArg {
    Keyword,
    Hybrid,
}

impl From<RankerArg> for RankerKind {
    fn from(arg: RankerArg) -> Self {
        match arg {
            RankerArg::Keyword => RankerKind::Keyword,
            RankerArg::Hybrid => RankerKind::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SummarizerArg {
    Extractive,
    Openai,
}

impl From<SummarizerArg> for SummarizerKind {
    fn from(arg: SummarizerArg) -> Self {
        match arg {
            SummarizerArg::Extractive => SummarizerKind::Extractive,
            SummarizerArg::Openai => SummarizerKind::Openai,
        }
    }
}

/// Research digest CLI
#[derive(Parser, Debug)]
#[command(
    name = "paper-digest",
    version,
    about = "Get a short, summarized reading list for a research query",
    long_about = "Answer a research query with the most relevant papers and a short summary of \
                  each. Results are cached locally and refreshed from arXiv and Semantic Scholar \
                  once they are older than the staleness threshold.

EXAMPLES:
  Single query:
    paper-digest --query \"graph neural networks\"

  JSON output, nothing written to disk:
    paper-digest --ephemeral --query \"diffusion models\" --format json

  Interactive mode:
    paper-digest --interactive

ENVIRONMENT:
  OPENAI_API_KEY            required for --summarizer openai and OpenAI embeddings
  SEMANTIC_SCHOLAR_API_KEY  optional, raises Semantic Scholar rate limits"
)]
struct Args {
    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Database file path (overrides the config file)
    #[arg(long, value_name = "PATH", conflicts_with = "ephemeral")]
    db_path: Option<PathBuf>,

    /// Keep papers in memory only; nothing is written to disk
    #[arg(long)]
    ephemeral: bool,

    /// Research query (required for single-query mode, omitted in interactive mode)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    query: Option<String>,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "markdown")]
    format: OutputFormat,

    /// Ranking strategy (overrides the config file)
    #[arg(long, value_enum)]
    ranker: Option<RankerArg>,

    /// Summarization strategy (overrides the config file)
    #[arg(long, value_enum)]
    summarizer: Option<SummarizerArg>,

    /// FastEmbed model cache directory (only used with hybrid ranking)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

/// Load the config file (if any) and apply command-line overrides
fn load_config(args: &Args) -> Result<DigestConfig> {
    let mut config = match &args.config {
        Some(path) => DigestConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DigestConfig::default(),
    };

    if let Some(db_path) = &args.db_path {
        config.database_path = Some(db_path.clone());
    }
    if let Some(ranker) = args.ranker {
        config.ranking.kind = ranker.into();
    }
    if let Some(summarizer) = args.summarizer {
        config.summarizer.kind = summarizer.into();
    }
    if let Some(cache_dir) = &args.cache_dir {
        config.ranking.cache_dir = Some(cache_dir.clone());
    }

    config.validate().with_context(|| "Invalid configuration")?;
    Ok(config)
}

fn openai_api_key(purpose: &str) -> Result<String> {
    std::env::var("OPENAI_API_KEY").with_context(|| {
        format!(
            "OPENAI_API_KEY environment variable required for {}.\n\
             Set it with: export OPENAI_API_KEY=your-api-key",
            purpose
        )
    })
}

async fn create_storage(config: &DigestConfig, ephemeral: bool) -> Result<Arc<dyn PaperStorage>> {
    if ephemeral {
        info!("Using in-memory paper store");
        return Ok(Arc::new(MemoryStorage::new()));
    }

    let db_path = config.resolved_database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    info!("Opening paper store at: {}", db_path.display());
    let storage = SqliteStorage::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    Ok(Arc::new(storage))
}

/// Pick the embedding provider for hybrid ranking from the configured model name
fn create_embedding_provider(config: &DigestConfig) -> Result<DynamicEmbeddingProvider> {
    match config.ranking.embedding_model.as_deref() {
        Some(model) if model.contains("text-embedding") => {
            info!("Using OpenAI embedding model: {}", model);
            let api_key = openai_api_key("OpenAI embeddings")?;
            let provider = OpenAIEmbedding::new(api_key, Some(model.to_string()))
                .with_context(|| "Failed to create OpenAI embedding provider")?
                .with_max_batch_size(config.ranking.embedding_batch_size);
            Ok(DynamicEmbeddingProvider::OpenAI(provider))
        }
        _ => {
            info!("Using local FastEmbed model");
            let provider = FastEmbedProvider::new(None, config.ranking.cache_dir.clone())
                .with_context(|| "Failed to create FastEmbed provider")?;
            Ok(DynamicEmbeddingProvider::FastEmbed(provider))
        }
    }
}

fn create_ranker(config: &DigestConfig) -> Result<Arc<dyn Ranker>> {
    match config.ranking.kind {
        RankerKind::Keyword => Ok(Arc::new(KeywordRanker)),
        RankerKind::Hybrid => {
            let provider = create_embedding_provider(config)?;
            info!(
                "Hybrid ranking with {} (dimension: {})",
                provider.model_name(),
                provider.dimension()
            );
            Ok(Arc::new(HybridRanker::new(provider, config.ranking.semantic_weight)))
        }
    }
}

fn create_summarizer(config: &DigestConfig) -> Result<Arc<dyn Summarizer>> {
    let cfg = &config.summarizer;
    match cfg.kind {
        SummarizerKind::Extractive => Ok(Arc::new(ExtractiveSummarizer::new(
            cfg.max_sentences,
            cfg.max_chars,
        ))),
        SummarizerKind::Openai => {
            let api_key = openai_api_key("chat summarization")?;
            let summarizer = ChatSummarizer::new(api_key, Some(cfg.model.clone()), cfg.timeout_secs)
                .with_context(|| "Failed to create chat summarizer")?
                .with_base_url(cfg.base_url.clone());
            Ok(Arc::new(summarizer))
        }
    }
}

fn build_engine(config: &DigestConfig, storage: Arc<dyn PaperStorage>) -> Result<ResearchEngine> {
    let arxiv = ArxivProvider::new(&config.arxiv).with_context(|| "Failed to create arXiv client")?;
    let s2_key = std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok();
    let semantic_scholar = SemanticScholarProvider::new(&config.semantic_scholar, s2_key)
        .with_context(|| "Failed to create Semantic Scholar client")?;

    Ok(ResearchEngine::new(
        storage,
        Arc::new(arxiv),
        Arc::new(semantic_scholar),
        create_ranker(config)?,
        create_summarizer(config)?,
        config,
    ))
}

fn create_spinner(query: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Searching for \"{}\"", query.trim()));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run one query; Ctrl-C cancels it without exiting the process
async fn run_query(engine: &ResearchEngine, query: &str) -> DisplayableResult {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let spinner = create_spinner(query);
    let start = Instant::now();
    let result = engine.handle_query(query, &cancel).await;
    spinner.finish_and_clear();
    watcher.abort();

    if cancel.is_cancelled() {
        eprintln!("Query cancelled.");
    }
    debug!("Query finished in {:.2}s", start.elapsed().as_secs_f64());
    DisplayableResult::from_outcome(result)
}

/// Shorten `text` to `max` characters for table cells
fn truncate_display(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max - 3).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Format a digest as a pretty table
fn format_digest_table(entries: &[DigestEntry]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Source").add_attribute(Attribute::Bold),
        Cell::new("Authors").add_attribute(Attribute::Bold),
        Cell::new("Summary").add_attribute(Attribute::Bold),
    ]);

    for (idx, entry) in entries.iter().enumerate() {
        table.add_row(vec![
            Cell::new(format!("{}", idx + 1)),
            Cell::new(truncate_display(&entry.paper.title, 60)),
            Cell::new(&entry.paper.source).fg(Color::Cyan),
            Cell::new(truncate_display(&entry.paper.author_names(), 40)),
            Cell::new(truncate_display(&entry.summary, 200)),
        ]);
    }

    table.to_string()
}

fn render(result: &DisplayableResult, query: &str, format: OutputFormat) -> Result<String> {
    match (format, result) {
        (OutputFormat::Json, _) => serde_json::to_string_pretty(&result.to_response(query))
            .with_context(|| "Failed to serialize results to JSON"),
        (OutputFormat::Table, DisplayableResult::Digest(entries)) => Ok(format_digest_table(entries)),
        _ => Ok(result.render_markdown()),
    }
}

/// Display detailed view of a single digest entry
fn display_entry_detail(entry: &DigestEntry, rank: usize) {
    let paper = &entry.paper;
    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    println!("Title: {}", paper.title);
    println!("Source: {}", paper.source);
    println!(
        "Authors: {}",
        paper
            .authors
            .iter()
            .map(|a| match &a.affiliation {
                Some(aff) => format!("{} ({})", a.name, aff),
                None => a.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    );
    if let Some(year) = paper.publish_year {
        println!("Year: {}", year);
    }
    if let Some(url) = &paper.url {
        println!("URL: {}", url);
    }
    println!("\nSummary:\n{}", entry.summary);
    println!("\nAbstract:\n{}", paper.abstract_text);
    println!("{}", "═".repeat(80));
}

fn print_help() {
    println!("Commands:");
    println!("  <query>                  - Get a digest for the query");
    println!("  /format markdown|table|json - Change output format");
    println!("  /detail N                - Show full details for result rank N");
    println!("  /stats                   - Show how many papers are stored");
    println!("  /help                    - Show this help");
    println!("  Ctrl+D or Ctrl+C         - Exit");
}

/// Run interactive REPL mode
async fn run_interactive(
    engine: ResearchEngine,
    storage: Arc<dyn PaperStorage>,
    mut format: OutputFormat,
) -> Result<()> {
    println!("Interactive Paper Digest");
    print_help();
    println!();

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;
    let mut last_entries: Vec<DigestEntry> = Vec::new();

    loop {
        match rl.readline("Digest> ") {
            Ok(line) => {
                let line = line.trim();
                if !line.is_empty() {
                    rl.add_history_entry(line).ok();
                }

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts[0] {
                        "/help" => print_help(),
                        "/format" => match parts.get(1).copied() {
                            Some("markdown") => format = OutputFormat::Markdown,
                            Some("table") => format = OutputFormat::Table,
                            Some("json") => format = OutputFormat::Json,
                            _ => eprintln!("Usage: /format [markdown|table|json]"),
                        },
                        "/detail" => match parts.get(1).map(|n| n.parse::<usize>()) {
                            Some(Ok(rank)) if rank > 0 && rank <= last_entries.len() => {
                                display_entry_detail(&last_entries[rank - 1], rank);
                            }
                            Some(Ok(rank)) if rank > last_entries.len() => {
                                eprintln!(
                                    "Rank {} out of range (last digest had {} results)",
                                    rank,
                                    last_entries.len()
                                );
                            }
                            _ => eprintln!("Usage: /detail N"),
                        },
                        "/stats" => match storage.count_papers().await {
                            Ok(count) => println!("{} papers stored", count),
                            Err(e) => eprintln!("Failed to count papers: {}", e),
                        },
                        _ => eprintln!(
                            "Unknown command: {}. Type /help for available commands.",
                            parts[0]
                        ),
                    }
                    continue;
                }

                let result = run_query(&engine, line).await;
                if let DisplayableResult::Digest(entries) = &result {
                    last_entries = entries.clone();
                }
                match render(&result, line, format) {
                    Ok(output) => println!("{}\n", output),
                    Err(e) => eprintln!("Error formatting output: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Run single-query mode
async fn run_single_query(engine: ResearchEngine, query: &str, format: OutputFormat) -> Result<()> {
    let result = run_query(&engine, query).await;
    println!("{}", render(&result, query, format)?);
    if result == DisplayableResult::Failure {
        anyhow::bail!("Query failed; rerun with --log-level debug for details");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level);

    let query = match (&args.query, args.interactive) {
        (Some(query), _) => Some(query.clone()),
        (None, true) => None,
        (None, false) => anyhow::bail!(
            "Either --query or --interactive must be specified.\n\
             Use --help for usage information."
        ),
    };

    let config = load_config(&args)?;
    let storage = create_storage(&config, args.ephemeral).await?;
    let paper_count = storage
        .count_papers()
        .await
        .with_context(|| "Failed to count papers in database")?;
    info!("Paper store contains {} papers", paper_count);

    let engine = build_engine(&config, storage.clone())?;

    match query {
        Some(query) => run_single_query(engine, &query, args.format).await?,
        None => run_interactive(engine, storage, args.format).await?,
    }

    Ok(())
}
