//! Runs one tracking request against the configured answer engines and
//! prints the report as JSON.

mod config;

use anyhow::{Context, Result};
use citation_engine::{
    engines, Dispatcher, MemoryTrendStore, Query, ScoringConfig, TrackRequest, TrackedDomain,
    VisibilityTracker,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "visibility", about = "Measure how often AI answer engines cite a domain")]
struct Args {
    /// Domain to track, e.g. example.com
    #[arg(long)]
    domain: String,

    /// Question to ask every engine (repeatable)
    #[arg(long = "query", required = true)]
    queries: Vec<String>,

    /// Competitor domain scored on the same answers (repeatable)
    #[arg(long = "competitor")]
    competitors: Vec<String>,

    /// Brand name or canonical title mentioned alongside the domain
    #[arg(long)]
    title: Option<String>,

    /// Owner recorded on the tracked domain
    #[arg(long)]
    owner: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,citation_engine=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    tracing::info!(
        engines = config.engines.len(),
        workers = config.worker_limit,
        "Starting visibility run"
    );

    let request = build_request(&args)?;

    let scoring = ScoringConfig::from_engines(&config.engines);
    let adapters = config
        .engines
        .iter()
        .cloned()
        .map(engines::from_config)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to build engine adapters")?;
    let dispatcher = Dispatcher::new(adapters, config.dispatch_config())
        .context("Invalid dispatch configuration")?;
    let tracker = VisibilityTracker::new(dispatcher, MemoryTrendStore::new())
        .with_scoring_config(scoring);

    let report = tracker.track(request).await?;

    if report.is_no_data() {
        tracing::warn!(domain = %args.domain, "No engine produced a usable answer");
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_request(args: &Args) -> Result<TrackRequest> {
    let mut domain = TrackedDomain::parse(&args.domain)
        .with_context(|| format!("Invalid domain: {}", args.domain))?;
    if let Some(title) = &args.title {
        domain = domain.with_title(title);
    }
    if let Some(owner) = &args.owner {
        domain = domain.with_owner(owner);
    }

    let queries = args
        .queries
        .iter()
        .map(|q| Query::new(q.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid query")?;

    let mut request = TrackRequest::new(domain).with_queries(queries);
    for competitor in &args.competitors {
        let competitor = TrackedDomain::parse(competitor)
            .with_context(|| format!("Invalid competitor domain: {}", competitor))?;
        request = request.with_competitor(competitor);
    }

    Ok(request)
}
