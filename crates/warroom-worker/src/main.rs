mod report;
mod scheduler;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use warroom_analyst::{GroqClient, InferenceSettings, Synthesizer, SynthesizerSettings};
use warroom_db::{PgRepository, TriggerSource};
use warroom_scraper::{FetchSettings, ShopifyClient};

use crate::scheduler::{Driver, DriverSettings, Pipeline};

#[derive(Debug, Parser)]
#[command(name = "warroom-worker")]
#[command(about = "Competitor price monitoring and strategy synthesis")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the periodic scheduler loop (the default).
    Run {
        /// Stop after this many cycles.
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Run a single cycle now.
    Once {
        /// Only process this store.
        #[arg(long)]
        store_id: Option<i64>,
    },
    /// Print stored analyses.
    Report {
        /// Show the history of one store instead of the latest per store.
        #[arg(long)]
        store_id: Option<i64>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(warroom_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = warroom_db::PoolConfig::from_app_config(&config);
    let pool = warroom_db::connect_pool(&config.database_url, pool_config).await?;
    warroom_db::ping(&pool).await?;
    let applied = warroom_db::run_migrations(&pool).await?;
    tracing::info!(applied, env = %config.env, "database ready");

    let command = cli.command.unwrap_or(Commands::Run { cycles: None });
    if let Commands::Report { store_id, limit } = command {
        return report::run_report(&pool, store_id, limit).await;
    }

    let catalog = ShopifyClient::new(FetchSettings::from_config(&config))?;
    let inference = GroqClient::new(InferenceSettings::from_config(&config))?;
    let synthesizer = Synthesizer::new(
        Arc::new(inference),
        SynthesizerSettings::from_config(&config),
    );
    let shutdown = CancellationToken::new();
    let driver = Driver::new(
        Pipeline {
            repo: Arc::new(PgRepository::new(pool)),
            catalog: Arc::new(catalog),
            synthesizer: Arc::new(synthesizer),
        },
        DriverSettings::from_config(&config),
        shutdown.clone(),
    );

    match command {
        Commands::Once { store_id } => {
            let summary = driver
                .run_cycle(chrono::Utc::now(), TriggerSource::Manual, store_id)
                .await?;
            println!(
                "cycle complete: {} persisted ({} degraded), {} skipped",
                summary.persisted, summary.degraded, summary.skipped
            );
        }
        Commands::Run { cycles } => {
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.cancel();
            });
            tracing::info!(
                interval_secs = config.cycle_interval_secs,
                max_concurrent_stores = config.max_concurrent_stores,
                "scheduler started"
            );
            let completed = driver.run(cycles).await;
            tracing::info!(completed, "scheduler stopped");
        }
        Commands::Report { .. } => {}
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, finishing current cycle");
}
