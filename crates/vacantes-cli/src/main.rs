use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vacantes_storage::{run_migrations, PgVacancyStore};
use vacantes_sync::{run_scheduler_until_shutdown, Pipeline, SyncConfig};

#[derive(Debug, Parser)]
#[command(name = "vacantes-cli")]
#[command(about = "Watches the SENA APE listing page and keeps the vacantes table in sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one harvest cycle (default)
    Sync,
    /// Recompute dias_restantes for every stored row
    Refresh,
    /// Fetch and extract only; print the records as JSON
    Harvest,
    /// Run now, then on the configured cron until Ctrl-C
    Schedule,
    /// Serve the HTTP surface
    Serve,
    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();
    tracing::debug!(source = %config.source_url, cron = %config.sync_cron, "loaded configuration");

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let pipeline = Pipeline::from_config(&config)?;
            let summary = pipeline.run_cycle().await?;
            println!(
                "sync complete: run_id={} harvested={} new={} notified={} upserted={} store_failures={}",
                summary.run_id,
                summary.harvested,
                summary.new_codes.len(),
                summary.notified,
                summary.upserted,
                summary.store_failures
            );
        }
        Commands::Refresh => {
            let pipeline = Pipeline::from_config(&config)?;
            let outcome = pipeline.refresh_days_remaining().await;
            if outcome.failed {
                anyhow::bail!("refresh of dias_restantes failed; see log for the store error");
            }
            println!("refresh complete: updated={}", outcome.updated);
        }
        Commands::Harvest => {
            let pipeline = Pipeline::from_config(&config)?;
            let records = pipeline
                .harvest_only()
                .await
                .context("fetching listing page")?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Schedule => {
            let pipeline = Arc::new(Pipeline::from_config(&config)?);
            run_scheduler_until_shutdown(pipeline, &config.sync_cron).await?;
        }
        Commands::Serve => {
            let pipeline = Arc::new(Pipeline::from_config(&config)?);
            vacantes_web::serve_from_env(pipeline).await?;
        }
        Commands::Migrate => {
            let store = PgVacancyStore::connect_lazy(&config.database_url)
                .context("configuring database pool")?;
            run_migrations(store.pool())
                .await
                .context("applying migrations")?;
            println!("migrations applied");
        }
    }

    Ok(())
}
