//! Dispatch Worker - delivery route batching service
//!
//! This worker connects to NATS and answers requests under the `dispatch.` subjects.

mod admin;
mod cli;
mod config;
mod db;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::{Config, StoreBackend};
use crate::services::depots::DepotRegistry;
use crate::services::DispatchServices;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ../logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "dispatch-worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,dispatch_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("Configuration loaded (store: {:?})", config.store_backend);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let pool = postgres_pool(&config).await?;
            db::run_migrations(&pool).await
        }
        Command::Depots => {
            let depots = depot_registry(&config).await?;
            admin::list_depots(&depots).await.map(|_| ())
        }
        Command::AddDepot { name, lat, lng, default } => {
            let depots = depot_registry(&config).await?;
            admin::add_depot(&depots, name, lat, lng, default).await.map(|_| ())
        }
        Command::SetDefaultDepot { id } => {
            let depots = depot_registry(&config).await?;
            admin::set_default_depot(&depots, id).await.map(|_| ())
        }
    }
}

async fn postgres_pool(config: &Config) -> Result<sqlx::PgPool> {
    if config.store_backend != StoreBackend::Postgres {
        anyhow::bail!("this command needs STORE_BACKEND=postgres");
    }
    let url = config.database_url.as_deref().context("DATABASE_URL is not set")?;
    db::create_pool(url).await
}

async fn depot_registry(config: &Config) -> Result<DepotRegistry> {
    let pool = postgres_pool(config).await?;
    db::run_migrations(&pool).await?;
    Ok(DepotRegistry::new(Arc::new(db::PgStore::new(pool))))
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Dispatch Worker...");

    let store = db::connect_store(&config).await?;
    let services = DispatchServices::new(store, &config);

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    if let Err(e) = handlers::start_handlers(nats_client, Arc::new(services)).await {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}
