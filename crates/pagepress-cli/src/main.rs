//! Pagepress - batch keyword-to-article publishing
//!
//! The `pagepress` command reads keywords from a tabular source file,
//! generates content for each, publishes artifacts to the configured
//! destinations, maintains a deduplicated sitemap, and optionally pings a
//! search-engine indexing endpoint.
//!
//! ## Commands
//!
//! - `run`: one article per keyword
//! - `pregen`: several variations per keyword, generated in batched calls
//!
//! Destinations, the generator endpoint, and the indexing notifier are
//! configured through `PAGEPRESS_*` environment variables (a `.env` file is
//! honoured). The process exits 0 on completion even when individual items
//! failed; only configuration and source errors are fatal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};

use pagepress_core::{init_tracing, load_job_items, ItemKind, DEFAULT_TEMPLATE};
use pagepress_pipeline::{Orchestrator, OrchestratorConfig, PipelineError, RunSummary};
use pagepress_remote::{
    GeneratorConfig, HttpGenerator, IndexingConfig, IndexingNotifier, Publisher,
};
use pagepress_state::{checkpoint_path_for, FileCheckpoint};

#[derive(Parser)]
#[command(name = "pagepress")]
#[command(author = "Pagepress Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch keyword-to-article publishing engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by both run modes.
#[derive(clap::Args)]
struct RunArgs {
    /// Job source file (.csv or .tsv) with a `keyword` column
    source: PathBuf,

    /// Sitemap output path; the checkpoint side-file derives from it
    #[arg(long, default_value = "sitemap.xml")]
    sitemap: PathBuf,

    /// Worker pool size (clamped to 1..=100)
    #[arg(short, long, default_value = "5")]
    concurrency: usize,

    /// Site name substituted into the document template
    #[arg(long, default_value = "Pagepress")]
    site_name: String,

    /// Base URL embedded as each artifact's canonical link
    /// (defaults to the highest-priority destination's public base)
    #[arg(long)]
    base_url: Option<String>,

    /// Template file overriding the built-in document template
    #[arg(long, env = "PAGEPRESS_TEMPLATE")]
    template: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and publish one article per keyword
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Pre-generate several variations per keyword in batched calls
    Pregen {
        #[command(flatten)]
        args: RunArgs,

        /// Variations requested per keyword
        #[arg(long, default_value = "3")]
        variations: usize,

        /// Keywords per generation call
        #[arg(long, default_value = "10")]
        batch_size: usize,

        /// Minimum acceptable fraction of requested variations per keyword
        #[arg(long, default_value = "0.5")]
        min_fill: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run { args } => {
            let orchestrator = build_orchestrator(&args, 0.5)?;
            let items = load_job_items(&args.source).map_err(PipelineError::Source)?;
            info!(items = items.len(), source = %args.source.display(), "Loaded job source");

            let summary = orchestrator.run(items).await;
            print_summary(&summary);
            Ok(())
        }
        Commands::Pregen {
            args,
            variations,
            batch_size,
            min_fill,
        } => {
            let orchestrator = build_orchestrator(&args, min_fill)?;
            // Variation artifacts are derived content, not primary pages.
            let items: Vec<_> = load_job_items(&args.source)
                .map_err(PipelineError::Source)?
                .into_iter()
                .map(|mut item| {
                    item.kind = ItemKind::Derived;
                    item
                })
                .collect();
            info!(items = items.len(), source = %args.source.display(), "Loaded job source");

            let summary = orchestrator.run_batch(items, variations, batch_size).await;
            print_summary(&summary);
            Ok(())
        }
    }
}

/// Pre-flight: assemble every collaborator from the environment.
///
/// Fails fast when the generator endpoint is missing or no destination at
/// all is usable; both abort before any item processing begins.
fn build_orchestrator(args: &RunArgs, min_fill: f32) -> Result<Orchestrator> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("pagepress/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let generator_config = GeneratorConfig::from_env()
        .context("PAGEPRESS_GENERATOR_URL is not set")?
        .with_min_fill(min_fill);
    let generator = Arc::new(HttpGenerator::new(generator_config, client.clone()));

    let publisher = Publisher::from_env(&client);
    if publisher.is_empty() {
        return Err(PipelineError::NoDestination.into());
    }
    info!(destinations = ?publisher.destination_names(), "Configured destinations");

    let notifier = IndexingConfig::from_env()
        .map(|config| Arc::new(IndexingNotifier::new(config, client.clone())));
    if notifier.is_none() {
        debug!("Indexing notification disabled");
    }

    let checkpoint_path = checkpoint_path_for(&args.sitemap);
    let checkpoint = Arc::new(FileCheckpoint::load(checkpoint_path));

    let template = match &args.template {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?,
        None => DEFAULT_TEMPLATE.to_string(),
    };

    let config = OrchestratorConfig {
        concurrency: args.concurrency,
        site_name: args.site_name.clone(),
        base_url: resolve_base_url(args.base_url.clone()),
        template,
        sitemap_path: args.sitemap.clone(),
    };

    Ok(Orchestrator::new(
        generator,
        Arc::new(publisher),
        notifier,
        checkpoint,
        config,
    ))
}

/// Canonical-link base: explicit flag, else the public base of the
/// highest-priority configured destination.
fn resolve_base_url(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var("PAGEPRESS_STORAGE_PUBLIC_BASE").ok())
        .or_else(|| std::env::var("PAGEPRESS_BUCKET_PUBLIC_BASE").ok())
        .unwrap_or_else(|| "https://example.org".to_string())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run summary");
    println!("  generated: {}", summary.generated);
    for (destination, count) in &summary.published {
        println!("  published to {destination}: {count}");
    }
    println!("  indexed:   {}", summary.indexed);
    println!("  skipped:   {}", summary.skipped);
    println!("  failed:    {}", summary.failed);
    if !summary.failed_keys.is_empty() {
        println!("  failed keys:");
        for key in &summary.failed_keys {
            println!("    - {key}");
        }
    }
}
