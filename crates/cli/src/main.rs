//! Sprocket CLI entry point.
//!
//! This binary is the composition root for the entire system.
//! Responsibilities:
//!
//! 1. **Parse configuration** from the environment (`.env` honored for
//!    local development) and validate it.
//! 2. **Wire observability** with `tracing-subscriber`: an `EnvFilter`
//!    driven by `RUST_LOG`, plain or JSON output. All `tracing` spans and
//!    structured events emitted by every crate in the workspace flow
//!    through this layer.
//! 3. **Construct infrastructure** (`GithubFetcher`, `SqliteStore`,
//!    `InMemoryQueue`) and inject it into the processor and consumer.
//! 4. **Select a run mode**:
//!    - `analyze` parses a workflow file offline and prints its dependency
//!      records as JSON. No network, no store.
//!    - `run` takes one change event from a file and drives it through the
//!      full pipeline: queue, fetch, parse, extract, classify, store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use github::GithubFetcher;
use listener::{publish_with_retry, Consumer, InMemoryQueue};
use pipeline::extract::extract_dependencies;
use pipeline::parser::parse_workflow;
use pipeline::WorkflowChangeEvent;
use processor::Processor;
use store::SqliteStore;

mod config;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "sprocket", version, about = "CI workflow dependency analysis")]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable output.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a workflow file offline and print its dependency records.
    Analyze {
        /// Path to the workflow YAML file.
        #[arg(long)]
        file: PathBuf,
    },
    /// Run one change event through the full pipeline.
    Run {
        /// Path to a JSON-encoded workflow change event.
        #[arg(long)]
        event_file: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Analyze { file } => analyze(&file),
        Command::Run { event_file } => run(&event_file).await,
    }
}

/// Offline analysis: parse, extract, classify, print.
fn analyze(file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read(file)
        .with_context(|| format!("failed to read workflow file {}", file.display()))?;
    let model = parse_workflow(&content)
        .with_context(|| format!("failed to parse workflow file {}", file.display()))?;
    let records = extract_dependencies(&model);
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Full pipeline: publish the event, then drain the queue through the
/// processor against the live read API and the SQLite store.
async fn run(event_file: &Path) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let token = config.require_github_token()?.to_string();

    let event: WorkflowChangeEvent = serde_json::from_slice(
        &std::fs::read(event_file)
            .with_context(|| format!("failed to read event file {}", event_file.display()))?,
    )
    .context("event file is not a valid workflow change event")?;

    let fetcher = Arc::new(GithubFetcher::new(&config.github_api_url, token)?);
    let sqlite = Arc::new(SqliteStore::open(&config.database_path)?);
    let processor = Arc::new(Processor::new(
        fetcher,
        Arc::clone(&sqlite),
        Arc::clone(&sqlite),
        config.retry,
    ));
    let queue = Arc::new(InMemoryQueue::new(config.queue.clone()));

    publish_with_retry(queue.as_ref(), &event, &config.retry).await?;
    queue.close();
    Consumer::new(Arc::clone(&queue), processor).run().await;

    let buried = queue.dead_letters();
    if !buried.is_empty() {
        anyhow::bail!(
            "event for {} exhausted its delivery budget after {} deliveries",
            buried[0].event.workflow.path,
            buried[0].delivery_count
        );
    }
    tracing::info!(
        repository = event.repository.full_name.as_str(),
        path = event.workflow.path.as_str(),
        sha = event.commit.sha.as_str(),
        "event processed"
    );
    Ok(())
}
