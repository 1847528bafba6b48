//! Database module

mod memory;
mod postgres;
pub mod queries;
mod store;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::DispatchStore;

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::{Config, StoreBackend};

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Build the store selected by `STORE_BACKEND`, migrating PostgreSQL first.
pub async fn connect_store(config: &Config) -> Result<Arc<dyn DispatchStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store; state is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required when STORE_BACKEND=postgres")?;
            info!("Connecting to database...");
            let pool = create_pool(url).await?;
            info!("Connected to database");
            run_migrations(&pool).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

/// Run database migrations.
///
/// Stored checksums are refreshed first so CRLF/LF differences in the
/// migration files do not block startup.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    let migrator = sqlx::migrate!("./migrations");
    sync_migration_checksums(pool, &migrator).await?;
    migrator.run(pool).await?;

    info!("Database migrations complete");
    Ok(())
}

async fn sync_migration_checksums(pool: &PgPool, migrator: &sqlx::migrate::Migrator) -> Result<()> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(());
    }

    for migration in migrator.iter().filter(|m| !m.migration_type.is_down_migration()) {
        let result = sqlx::query(
            "UPDATE _sqlx_migrations SET checksum = $1 WHERE version = $2 AND checksum <> $1",
        )
        .bind(migration.checksum.as_ref())
        .bind(migration.version)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            warn!(
                "Migration {} ({}) checksum mismatch, stored checksum updated",
                migration.version, migration.description
            );
        }
    }

    Ok(())
}
