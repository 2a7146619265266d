use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use basalt::analyzers::AnalyzerDeps;
use basalt::classify::TargetKind;
use basalt::config::Config;
use basalt::db::{self, Database, SqliteDatabase};
use basalt::feeds::source::{FeedFetcher, HttpFeedFetcher};
use basalt::feeds::IndicatorStore;
use basalt::inference::{HttpInferenceBackend, InferenceBackend};
use basalt::output::terminal;
use basalt::pipeline::ThreatPipeline;
use basalt::registry::ModelRegistry;

/// Basalt: threat-intelligence analysis pipeline.
///
/// Classifies an identifier (domain, URL, IP, email, or hash), checks it
/// against locally cached threat feeds, and runs ML analysis through the
/// configured inference backend.
#[derive(Parser)]
#[command(name = "basalt", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local database
    Init,

    /// Analyze a target and print the verdict
    Analyze {
        /// The identifier to analyze (e.g. evil.test, https://evil.test/x, 1.2.3.4)
        target: String,

        /// Force the target kind instead of auto-detecting
        /// (domain, url, ip, email, hash)
        #[arg(long)]
        kind: Option<String>,

        /// Print the verdict as JSON instead of the formatted display
        #[arg(long)]
        json: bool,
    },

    /// Pull all configured threat feeds now
    Refresh,

    /// Load the configured models and show their status
    Models,

    /// Show system status (DB stats, feed freshness)
    Status,

    /// Run resident: periodic feed refresh and model maintenance
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("basalt=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let config = Config::load()?;
            let conn = db::initialize(&config.db_path)?;
            let store: Arc<dyn Database> = Arc::new(SqliteDatabase::new(conn));
            let table_count = store.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nBasalt is ready. Next steps:");
            println!("  - point BASALT_BACKEND_URL at your inference backend");
            println!("  - set BASALT_FEED_URLS and run: basalt refresh");
        }

        Commands::Analyze { target, kind, json } => {
            let kind = match kind {
                Some(raw) => match TargetKind::parse(&raw) {
                    Some(kind) => Some(kind),
                    None => anyhow::bail!(
                        "Unknown kind {raw:?}. Expected one of: domain, url, ip, email, hash."
                    ),
                },
                None => None,
            };

            let config = Config::load()?;
            let store = open_database(&config)?;
            let (registry, _indicators, pipeline) = build_pipeline(&config, store)?;

            registry.load_all().await;

            let verdict = pipeline
                .analyze(&target, kind, &serde_json::json!({}))
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                terminal::display_verdict(&target, &verdict);
            }
        }

        Commands::Refresh => {
            let config = Config::load()?;
            config.require_feeds()?;
            let store = open_database(&config)?;
            let (_registry, indicators, _pipeline) = build_pipeline(&config, store)?;

            let merged = indicators.refresh().await?;
            println!(
                "Merged {merged} indicators from {} feed sources.",
                config.feed_urls.len()
            );
        }

        Commands::Models => {
            let config = Config::load()?;
            let store = open_database(&config)?;
            let (registry, _indicators, _pipeline) = build_pipeline(&config, store)?;

            registry.load_all().await;
            terminal::display_models(&registry.all().await);
        }

        Commands::Status => {
            let config = Config::load()?;
            let store = open_database(&config)?;
            basalt::status::show(&store, &config).await?;
        }

        Commands::Watch => {
            let config = Config::load()?;
            let feed_refresh = config.feed_refresh;
            let store = open_database(&config)?;
            let (registry, indicators, _pipeline) = build_pipeline(&config, store)?;

            registry.load_all().await;
            let (update_task, monitor_task) = Arc::clone(&registry).spawn_maintenance();

            let refresh_store = Arc::clone(&indicators);
            let refresh_task = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(feed_refresh);
                loop {
                    // First tick fires immediately: pull feeds at startup.
                    ticker.tick().await;
                    if let Err(e) = refresh_store.refresh().await {
                        warn!(error = %e, "Scheduled feed refresh failed");
                    }
                }
            });

            info!("Watch mode running; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            info!("Shutting down");

            refresh_task.abort();
            update_task.abort();
            monitor_task.abort();
        }
    }

    Ok(())
}

/// Open the configured database (created by `basalt init`).
fn open_database(config: &Config) -> Result<Arc<dyn Database>> {
    let conn = db::open(&config.db_path)?;
    Ok(Arc::new(SqliteDatabase::new(conn)))
}

/// Wire the HTTP backends, indicator store, registry, and pipeline.
fn build_pipeline(
    config: &Config,
    store: Arc<dyn Database>,
) -> Result<(Arc<ModelRegistry>, Arc<IndicatorStore>, ThreatPipeline)> {
    let backend: Arc<dyn InferenceBackend> = Arc::new(HttpInferenceBackend::new(
        &config.backend_url,
        config.request_timeout,
    )?);
    let fetcher: Arc<dyn FeedFetcher> = Arc::new(HttpFeedFetcher::new(config.request_timeout)?);

    let indicators = Arc::new(IndicatorStore::new(
        Arc::clone(&store),
        fetcher,
        config.feed_urls.clone(),
        config.feed_staleness,
    ));
    let registry = Arc::new(ModelRegistry::new(
        Arc::clone(&backend),
        Arc::clone(&store),
        config.model_names.clone(),
    ));

    let deps = AnalyzerDeps {
        backend,
        store,
        registry: Arc::clone(&registry),
    };
    let pipeline = ThreatPipeline::new(Arc::clone(&registry), Arc::clone(&indicators), deps);

    Ok((registry, indicators, pipeline))
}
