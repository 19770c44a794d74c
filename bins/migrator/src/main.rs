//! Database migration runner for Carrel.
//!
//! Usage:
//!   migrator up       - Run all pending migrations (default)
//!   migrator down     - Rollback last migration
//!   migrator status   - Show migration status
//!   migrator fresh    - Drop all tables and re-run migrations
//!   migrator reset    - Rollback every migration
//!
//! The database URL comes from `DATABASE_URL`, else from the server
//! configuration (`CARREL__DATABASE__URL`, `config/*.toml`).

use anyhow::{Context, bail};
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing_subscriber::EnvFilter;

use carrel_db::{connect, migration::Migrator};
use carrel_shared::AppConfig;

fn database_url() -> anyhow::Result<String> {
    if let Some(url) = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()) {
        return Ok(url);
    }
    let config = AppConfig::load().context("Failed to load configuration")?;
    if config.database.url.is_empty() {
        bail!("no database URL: set DATABASE_URL or CARREL__DATABASE__URL");
    }
    Ok(config.database.url)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carrel=info,sea_orm_migration=info".into()),
        )
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());
    let db = connect(&database_url()?)
        .await
        .context("Failed to connect to database")?;

    match command.as_str() {
        "up" => Migrator::up(&db, None).await?,
        "down" => Migrator::down(&db, Some(1)).await?,
        "status" => Migrator::status(&db).await?,
        "fresh" => Migrator::fresh(&db).await?,
        "reset" => Migrator::reset(&db).await?,
        other => bail!("unknown command '{other}' (expected up, down, status, fresh, reset)"),
    }

    info!(command = %command, "Migration command finished");
    Ok(())
}
