mod config;
mod database;
mod monitoring;
mod notify;
mod orchestrator;
mod pool;
mod validation;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::database::models::Endpoint;
use crate::database::{Database, DatabaseImpl, initialize_database};
use crate::monitoring::HttpProber;
use crate::notify::EmailNotifier;
use crate::orchestrator::Sweeper;
use crate::pool::{LibsqlManager, LibsqlPool};

#[derive(Parser)]
#[command(name = "sitemon", version, about = "HTTP endpoint uptime monitor")]
struct Cli {
    /// Path to the configuration file (defaults to the XDG config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitoring service with scheduled sweeps
    Run,
    /// Force one sweep over all endpoints and exit
    Sweep,
    /// Register a new endpoint to monitor
    Add {
        name: String,
        url: String,
        /// Substring a 200 response must contain to count as healthy
        #[arg(long)]
        expected_text: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref())?;

    let db = libsql::Builder::new_local(&config.database.path).build().await?;
    let manager = LibsqlManager::new(db);
    let pool: LibsqlPool = LibsqlPool::builder(manager).build()?;

    let conn = pool.get().await?;
    initialize_database(&conn).await?;
    drop(conn);

    let database: Arc<dyn Database> = Arc::new(DatabaseImpl::new_from_pool(pool));

    match cli.command {
        Command::Run => {
            let sweeper = Arc::new(build_sweeper(&config, database)?);
            info!("starting scheduled sweeps every {}s", config.sweep.tick_seconds);

            tokio::select! {
                _ = sweeper.clone().run_scheduled(Duration::from_secs(config.sweep.tick_seconds)) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                }
            }
        }
        Command::Sweep => {
            let sweeper = build_sweeper(&config, database)?;
            let report = sweeper.run_sweep(true).await?;
            info!(
                checked = report.checked,
                alerts = report.alerts,
                recoveries = report.recoveries,
                "forced sweep finished"
            );
        }
        Command::Add { name, url, expected_text } => {
            let normalized = validation::normalize_url(&url)?;
            let mut endpoint = Endpoint::new(name, normalized);
            endpoint.expected_text = expected_text;

            let id = database.save_endpoint(&endpoint).await?;
            info!(id, name = %endpoint.name, url = %endpoint.url, "endpoint registered");
        }
    }

    Ok(())
}

fn build_sweeper(config: &Config, database: Arc<dyn Database>) -> Result<Sweeper> {
    let prober =
        Arc::new(HttpProber::new(Duration::from_secs(config.sweep.probe_timeout_seconds))?);
    let notifier = Arc::new(EmailNotifier::new(
        database.clone(),
        config.email.sender_domain.clone(),
        Duration::from_secs(config.email.smtp_timeout_seconds),
    ));

    Ok(Sweeper::new(database, prober, notifier))
}
