mod adapters;
mod config;
mod core;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pr-reviewer")]
#[command(about = "Reviews pull request hunks with a language model and posts inline review comments", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, env = "GITHUB_EVENT_PATH", help = "Pull request event document (JSON)")]
    event_path: Option<PathBuf>,

    #[arg(long, help = "Config file (defaults to .pr-reviewer.yml when present)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Print comments as JSON instead of publishing them")]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load(cli.config.as_deref())?;
    info!("Configuration: {}", config.redacted_summary());

    if !config.review_enabled {
        info!("Review is disabled");
        return Ok(());
    }

    let event_path = cli
        .event_path
        .context("No event document. Pass --event-path or set GITHUB_EVENT_PATH")?;
    let event = core::PullRequestEvent::load(&event_path)?;
    if let core::EventKind::Other(action) = &event.kind {
        info!("Unsupported event: {}", action);
        return Ok(());
    }

    let host = adapters::GitHubClient::new(config.github_token.clone(), &config.github_api_url)?;
    let reviewer = adapters::llm::ReviewModelClient::from_config(&config)?;
    if let Some(model) = reviewer.model_name() {
        info!("Starting review with model: {}", model);
    }

    let settings = core::PipelineSettings::from_config(&config, cli.dry_run);
    let pipeline = core::ReviewPipeline::new(&host, &reviewer, settings);

    if let core::RunOutcome::Completed(summary) = pipeline.run(&event).await? {
        if cli.dry_run {
            println!("{}", serde_json::to_string_pretty(&summary.comments)?);
        }
    }

    Ok(())
}
