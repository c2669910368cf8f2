use std::path::Path;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use retag_cli::{Command, Config, RunArgs};
use retag_client::OpenAIClient;
use retag_core::{AppError, GenerationConfig, RegenerationEngine, RunResult, TracingReporter, WorkItem};
use retag_db::{FailureRepository, TagRepository, ensure_schema};

type Engine = RegenerationEngine<TagRepository, OpenAIClient, TagRepository, FailureRepository>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = Config::parse();

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    ensure_schema(&pool).await.map_err(user_error)?;

    let tags = TagRepository::new(pool.clone());
    let failures = FailureRepository::new(pool);

    match &config.command {
        Command::Regenerate { run } => {
            let engine = build_engine(&config, run, tags, failures)?;
            let result = with_interrupt(&engine, engine.regenerate_all(&TracingReporter))
                .await
                .map_err(user_error)?;
            print_run_summary("Regeneration", &result);
        }
        Command::Retry { run } => {
            let engine = build_engine(&config, run, tags, failures)?;
            let result = with_interrupt(&engine, engine.retry_failed(&TracingReporter))
                .await
                .map_err(user_error)?;
            print_run_summary("Retry", &result);
        }
        Command::Failures { clear: true } => {
            let removed = failures.delete_all().await.map_err(user_error)?;
            info!("Deleted {} failure records", removed);
        }
        Command::Failures { clear: false } => {
            list_failures(&failures).await?;
        }
        Command::Import { path } => {
            import_resources(&tags, path).await?;
        }
    }

    Ok(())
}

fn build_engine(
    config: &Config,
    run: &RunArgs,
    tags: TagRepository,
    failures: FailureRepository,
) -> anyhow::Result<Engine> {
    let generation = run.apply(GenerationConfig::from_env());
    let client = OpenAIClient::with_config(
        config.api_key.as_deref().unwrap_or_default(),
        &config.model,
        config.endpoint.as_deref(),
        config.http_config(),
    )
    .map_err(user_error)?;

    info!(
        model = client.model(),
        endpoint = client.endpoint(),
        batch_size = generation.batch_size,
        "Tag generator configured"
    );
    if config.api_key.is_none() && config.endpoint.is_none() {
        warn!("OPENAI_API_KEY is not set; requests to the default endpoint will be rejected");
    }

    RegenerationEngine::new(tags.clone(), client, tags, failures, generation).map_err(user_error)
}

/// Runs `run` while Ctrl-C cancels the engine's active run.
///
/// In-flight items finish before the run stops.
async fn with_interrupt<F>(engine: &Engine, run: F) -> Result<RunResult, AppError>
where
    F: Future<Output = Result<RunResult, AppError>>,
{
    let canceller = engine.canceller();
    let listener = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight items finish");
            canceller.cancel();
        }
    });

    let result = run.await;
    listener.abort();
    result
}

async fn list_failures(failures: &FailureRepository) -> anyhow::Result<()> {
    let records = failures.get_all().await.map_err(user_error)?;
    if records.is_empty() {
        info!("No recorded failures.");
        return Ok(());
    }

    let max_retries = GenerationConfig::from_env().max_retries;
    for record in &records {
        let marker = if record.is_retriable(max_retries) {
            " "
        } else {
            "x"
        };
        println!(
            "[{}] {:>3}  {}  {}  {}",
            marker,
            record.retry_count,
            record.first_failure_at.format("%Y-%m-%d %H:%M"),
            record.url,
            record.reason
        );
    }
    let retriable = records
        .iter()
        .filter(|r| r.is_retriable(max_retries))
        .count();
    info!(
        "{} failures, {} retriable (max retries: {})",
        records.len(),
        retriable,
        max_retries
    );
    Ok(())
}

async fn import_resources(tags: &TagRepository, path: &Path) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut imported = 0;
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item: WorkItem = serde_json::from_str(line)
            .with_context(|| format!("Invalid resource on line {}", index + 1))?;
        if !item.is_eligible() {
            warn!(id = %item.id, line = index + 1, "Skipping resource without url");
            continue;
        }
        tags.upsert_resource(&item).await.map_err(user_error)?;
        imported += 1;
    }

    info!("Imported {} resources from {}", imported, path.display());
    Ok(())
}

fn print_run_summary(label: &str, result: &RunResult) {
    let outcome = if result.cancelled {
        "cancelled"
    } else {
        "complete"
    };
    info!("");
    info!("{} {}", label, outcome);
    info!("  Total:       {}", result.total);
    info!("  Processed:   {}", result.processed());
    info!("  Successful:  {}", result.successful);
    info!("  Failed:      {}", result.failed);
    if result.failed > 0 {
        info!("Run `retag failures` to inspect, `retag retry` to try again.");
    }
}

fn user_error(err: AppError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}
