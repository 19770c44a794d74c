//! Carrel API Server
//!
//! Main entry point for the seat occupancy and fee ledger service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carrel_api::{AppState, create_router};
use carrel_core::{LibraryEngine, LibraryStore, MemoryLibraryStore};
use carrel_db::{PgLibraryStore, connect_with};
use carrel_shared::config::StoreBackend;
use carrel_shared::{AppConfig, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carrel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Pick the store
    let store: Arc<dyn LibraryStore> = match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryLibraryStore::new())
        }
        StoreBackend::Postgres => {
            let db = connect_with(&config.database)
                .await
                .context("Failed to connect to database")?;
            info!("Connected to database");
            Arc::new(PgLibraryStore::new(db))
        }
    };

    let jwt_config = JwtConfig {
        secret: config.jwt.secret.clone(),
        #[allow(clippy::cast_possible_wrap)]
        access_token_expires_minutes: (config.jwt.access_token_expiry_secs / 60) as i64,
    };

    let state = AppState {
        engine: Arc::new(LibraryEngine::new(store)),
        jwt_service: Arc::new(JwtService::new(jwt_config)),
    };

    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
