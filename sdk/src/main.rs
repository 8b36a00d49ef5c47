use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{error, info};

use ingestion::embedding_client::EmbeddingClient;
use ingestion::http::build_client;
use ingestion::llm_chunker::LlmChunker;
use ingestion::url_policy::NoOpUrlPolicy;
use jobs::{chunking_service, embedding_service, fts_service, runner};
use newsloom_core::config::AppConfig;
use newsloom_core::error::{Classify, ErrorClass};
use newsloom_core::metrics::MetricsCollector;
use query::{TrendsRequest, TrendsService};
use storage::Repository;

/// The one error an operator-facing command raises that has no richer classification
/// of its own — config loading, the initial connection, and CLI argument misuse are
/// all `config_error` (§7): they are caught before any subcommand body runs.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct CliConfigError(String);

impl Classify for CliConfigError {
    fn class(&self) -> ErrorClass {
        ErrorClass::ConfigError
    }
}

/// Maps the top-level `Result`'s error through whichever crate's `classify()` applies
/// (§7): a `CliConfigError` from this binary, a `StorageError` from a repo call, or a
/// validation error from an ad-hoc request builder. Anything unrecognized is treated as
/// a non-fatal runtime error rather than silently exiting 0.
fn classify_failure(err: &anyhow::Error) -> ErrorClass {
    if let Some(e) = err.downcast_ref::<CliConfigError>() {
        return e.class();
    }
    if let Some(e) = err.downcast_ref::<storage::StorageError>() {
        return e.class();
    }
    if err.downcast_ref::<query::RequestError>().is_some() {
        return ErrorClass::ConfigError;
    }
    ErrorClass::PermanentIo
}

#[derive(Parser)]
#[command(name = "newsloom", about = "RSS ingestion and trend-detection pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or verify the relational schema
    Ensure,
    /// Register a feed to be polled
    Discovery {
        #[arg(long)]
        feed: String,
    },
    /// Run one feed-polling pass
    Poll {
        #[arg(long, default_value_t = 50)]
        batch_size: i64,
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Run one article-worker pass
    Work {
        #[arg(long, default_value_t = 50)]
        batch_size: i64,
    },
    /// Run one or more continuous services until interrupted
    Services {
        #[command(subcommand)]
        action: ServicesAction,
    },
    /// Ad-hoc search over indexed articles (out of core scope; listed for completeness)
    Rag {
        query: String,
    },
    /// Emit a summary of recent pipeline activity
    Report {
        #[arg(long, default_value_t = false)]
        send_telegram: bool,
    },
}

#[derive(Subcommand)]
enum ServicesAction {
    Start {
        #[arg(long, value_delimiter = ',')]
        services: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    newsloom_core::init_tracing();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            error!(error = %err, "command failed");
            classify_failure(&err).exit_code()
        }
    };
    std::process::exit(exit_code);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()
        .map_err(|e| CliConfigError(format!("loading configuration: {e}")))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.pool_size)
        .connect(&config.database.dsn)
        .await
        .map_err(|e| CliConfigError(format!("connecting to postgres: {e}")))?;
    let repo = Repository::new(pool);

    match cli.command {
        Commands::Ensure => {
            storage::schema::ensure_schema(repo.pool(), config.embedding.dim).await?;
            info!("schema ensured");
            Ok(())
        }
        Commands::Discovery { feed } => {
            let feed_id = repo.insert_feed(&feed).await?;
            info!(feed_id, url = %feed, "feed registered");
            Ok(())
        }
        Commands::Poll { batch_size, workers } => cmd_poll(&repo, &config, batch_size, workers).await,
        Commands::Work { batch_size } => cmd_work(&repo, &config, batch_size).await,
        Commands::Services { action } => match action {
            ServicesAction::Start { services } => cmd_services(&repo, &config, services).await,
        },
        Commands::Rag { query } => cmd_rag(&repo, &config, &query).await,
        Commands::Report { send_telegram } => cmd_report(&repo, send_telegram).await,
    }
}

async fn cmd_poll(
    repo: &Repository,
    config: &AppConfig,
    batch_size: i64,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let mut poller_config = config.poller.0.clone();
    if let Some(workers) = workers {
        poller_config.workers = workers;
    }
    let client = build_client();
    let outcome = ingestion::feed_poller::poll(repo, &client, &poller_config, batch_size, "cli-poll").await?;
    info!(
        feeds_polled = outcome.feeds_polled,
        entries_enqueued = outcome.entries_enqueued,
        "poll complete"
    );
    Ok(())
}

async fn cmd_work(repo: &Repository, config: &AppConfig, batch_size: i64) -> anyhow::Result<()> {
    let client = build_client();
    let policy = NoOpUrlPolicy;
    let counts = ingestion::article_worker::work(repo, &client, &policy, &config.worker.0, batch_size, "cli-work")
        .await?;
    info!(
        stored = counts.stored,
        duplicate = counts.duplicate,
        retried = counts.retried,
        error = counts.error,
        "work complete"
    );
    Ok(())
}

/// Runs each requested continuous service as its own loop until ctrl-c (§9's
/// "each continuous service must be startable in isolation" note). Unknown names are
/// a configuration error, not a silent no-op.
const METRICS_HISTORY: usize = 100;

async fn cmd_services(repo: &Repository, config: &AppConfig, services: Vec<String>) -> anyhow::Result<()> {
    if services.is_empty() {
        return Err(CliConfigError("--services requires at least one service name".to_string()).into());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let http_client = build_client();
    let mut handles = Vec::new();

    for name in services {
        let repo = repo.clone();
        let rx = shutdown_rx.clone();
        match name.as_str() {
            "chunk-continuous" => {
                let chunker = Arc::new(LlmChunker::new(http_client.clone(), config.llm.clone()));
                let interval = config.chunk_loop.interval();
                let batch_size = config.chunk_loop.batch_size;
                let metrics = MetricsCollector::new(METRICS_HISTORY);
                let worker_tag = format!("chunk-continuous-{}", std::process::id());
                handles.push(tokio::spawn(async move {
                    runner::run_loop("chunk-continuous", interval, rx, &metrics, || {
                        let repo = repo.clone();
                        let chunker = chunker.clone();
                        let worker_tag = worker_tag.clone();
                        async move { chunking_service::tick(&repo, chunker, batch_size, &worker_tag).await }
                    })
                    .await;
                }));
            }
            "embed-continuous" => {
                let client = Arc::new(EmbeddingClient::new(
                    http_client.clone(),
                    config.llm.base_url.clone(),
                    config.embedding.clone(),
                ));
                let embedding_config = Arc::new(config.embedding.clone());
                let interval = config.embed_loop.interval();
                let batch_size = config.embed_loop.batch_size;
                let max_attempts = config.worker.0.max_attempts;
                let metrics = MetricsCollector::new(METRICS_HISTORY);
                let worker_tag = format!("embed-continuous-{}", std::process::id());
                handles.push(tokio::spawn(async move {
                    runner::run_loop("embed-continuous", interval, rx, &metrics, || {
                        let repo = repo.clone();
                        let client = client.clone();
                        let embedding_config = embedding_config.clone();
                        let worker_tag = worker_tag.clone();
                        async move {
                            embedding_service::tick(&repo, &client, &embedding_config, batch_size, max_attempts, &worker_tag).await
                        }
                    })
                    .await;
                }));
            }
            "fts-continuous" => {
                let language = config.default_fts_language.clone();
                let interval = config.fts_loop.interval();
                let batch_size = config.fts_loop.batch_size;
                let metrics = MetricsCollector::new(METRICS_HISTORY);
                let worker_tag = format!("fts-continuous-{}", std::process::id());
                handles.push(tokio::spawn(async move {
                    runner::run_loop("fts-continuous", interval, rx, &metrics, || {
                        let repo = repo.clone();
                        let language = language.clone();
                        let worker_tag = worker_tag.clone();
                        async move { fts_service::tick(&repo, &language, batch_size, &worker_tag).await }
                    })
                    .await;
                }));
            }
            other => {
                return Err(CliConfigError(format!("unknown service: {other}")).into());
            }
        }
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

async fn cmd_rag(repo: &Repository, config: &AppConfig, _query: &str) -> anyhow::Result<()> {
    let service = TrendsService::new(repo.clone(), config.trends.0.clone());
    let request = TrendsRequest::new(config.trends.0.window_hours, config.trends.0.fetch_limit, config.trends.0.top_n)?;
    let trends = service.get(request).await?;
    for trend in trends {
        println!("cluster {} score={:.3} keywords={:?}", trend.cluster_id, trend.score, trend.keywords);
    }
    Ok(())
}

async fn cmd_report(repo: &Repository, send_telegram: bool) -> anyhow::Result<()> {
    let row: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            count(*) FILTER (WHERE status = 'stored') AS stored,
            count(*) FILTER (WHERE status = 'duplicate') AS duplicate,
            count(*) FILTER (WHERE status = 'error') AS error
        FROM raw
        "#,
    )
    .fetch_one(repo.pool())
    .await?;

    println!("stored={} duplicate={} error={}", row.0, row.1, row.2);
    if send_telegram {
        info!("telegram delivery is not wired up in this deployment; printing summary only");
    }
    Ok(())
}
