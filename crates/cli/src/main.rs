use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swarm_embeddings::EmbeddingClient;
use swarm_indexer::{
    compute_root_hash, relative_path, FsWalker, IndexOptions, JsonMetadataStore, MetadataStore,
    Orchestrator, RootOutcome,
};
use swarm_search_index::SearchIndexClient;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

mod config;
mod report;

#[derive(Parser)]
#[command(name = "swarm-indexer")]
#[command(about = "Index text files into a hybrid search index for context retrieval", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index one or more directories (unchanged ones are skipped)
    Index(IndexArgs),

    /// Hybrid text + vector search over indexed chunks
    Search(SearchArgs),

    /// Show what is known about indexed directories
    Status(StatusArgs),

    /// Remove every indexed chunk of one file
    Forget(ForgetArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Directories to index
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Concurrent file workers (overrides SWARM_WORKERS)
    #[arg(long)]
    workers: Option<usize>,

    /// Records per search-index write (overrides SWARM_BATCH_SIZE)
    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Maximum number of results
    #[arg(long, short = 'n', default_value_t = 10)]
    limit: usize,

    /// Output JSON format
    #[arg(long)]
    json: bool,

    /// Skip the query embedding and run a lexical-only search
    #[arg(long)]
    text_only: bool,
}

#[derive(Args)]
struct StatusArgs {
    /// Indexed directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Args)]
struct ForgetArgs {
    /// Directory the file was indexed under
    root: PathBuf,

    /// Path of the file relative to ROOT
    relative_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // reqwest/hyper internals are noisy at debug
    if !cli.verbose {
        builder.filter_module("hyper", log::LevelFilter::Warn);
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = Config::from_env();
    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    match cli.command {
        Commands::Index(args) => run_index(args, &config, &cancel).await,
        Commands::Search(args) => run_search(args, &config, &cancel).await,
        Commands::Status(args) => run_status(args, &cancel).await,
        Commands::Forget(args) => run_forget(args, &config, &cancel).await,
    }
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing in-flight work");
            cancel.cancel();
        }
    });
}

/// Index directories
async fn run_index(args: IndexArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
    let embedder = EmbeddingClient::new(config.embeddings()?)
        .context("Failed to create embedding client")?;
    let index = SearchIndexClient::new(config.search_index())
        .context("Failed to create search index client")?;
    let orchestrator = Orchestrator::new(Arc::new(embedder), Arc::new(index));

    let options = IndexOptions::default()
        .with_workers(args.workers.unwrap_or(config.workers))
        .with_batch_size(args.batch_size.unwrap_or(config.batch_size));

    let reports = orchestrator
        .index_roots(cancel, &args.paths, &options)
        .await
        .context("Indexing interrupted")?;

    let mut failed = 0usize;
    for report in &reports {
        if matches!(report.outcome, RootOutcome::Failed(_)) {
            failed += 1;
        }
        eprintln!("{}", report::format_report(report));
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} roots failed", reports.len());
    }
    Ok(())
}

/// Search indexed chunks
async fn run_search(args: SearchArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
    let index = SearchIndexClient::new(config.search_index())
        .context("Failed to create search index client")?;

    let vector = if args.text_only {
        Vec::new()
    } else {
        let embedder = EmbeddingClient::new(config.embeddings()?)
            .context("Failed to create embedding client")?;
        embedder
            .embed(cancel, &args.query)
            .await
            .context("Failed to embed query")?
    };

    let hits = index
        .search(cancel, &args.query, &vector, args.limit)
        .await
        .context("Search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        print!("{}", report::format_hits(&hits));
    }
    Ok(())
}

/// Show indexing status per directory
async fn run_status(args: StatusArgs, cancel: &CancellationToken) -> Result<()> {
    let store = JsonMetadataStore;
    let walker = FsWalker::new();

    for path in &args.paths {
        let label = path.display().to_string();
        let metadata = store
            .load(path)
            .await
            .with_context(|| format!("Failed to read metadata for {label}"))?;

        let up_to_date = match &metadata {
            Some(meta) => match compute_root_hash(&walker, path, cancel).await {
                Ok(hash) => Some(meta.content_hash.as_deref() == Some(hash.as_str())),
                Err(err) => {
                    log::warn!("Could not hash {label}: {err}");
                    None
                }
            },
            None => None,
        };
        println!("{}", report::format_status(&label, metadata.as_ref(), up_to_date));
    }
    Ok(())
}

/// Delete all chunks of one file
async fn run_forget(args: ForgetArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
    let index = SearchIndexClient::new(config.search_index())
        .context("Failed to create search index client")?;

    // Records are keyed by the canonical root and the `/`-separated path below it.
    let root = tokio::fs::canonicalize(&args.root)
        .await
        .with_context(|| format!("Failed to resolve {}", args.root.display()))?;
    let target = Path::new(&args.relative_path);
    let relative = if target.is_absolute() {
        let target = tokio::fs::canonicalize(target)
            .await
            .unwrap_or_else(|_| target.to_path_buf());
        relative_path(&root, &target)
    } else {
        args.relative_path.replace('\\', "/")
    };

    let root_label = root.display().to_string();
    let deleted = index
        .delete_by_path(cancel, &root_label, &relative)
        .await
        .with_context(|| format!("Failed to forget {relative}"))?;
    eprintln!("Removed {deleted} chunks of {relative} (indexed under {root_label})");
    Ok(())
}
