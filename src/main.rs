use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use hcore_api::api::{create_router, AppState};
use hcore_api::config::Config;
use hcore_api::db::PgStore;
use hcore_api::i18n::{catalog, MessageRegistry};
use hcore_api::upsert::{MemoryStore, RecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Load configuration from environment
    let config = Config::from_env()?;

    // Initialize logging
    let level = if config.dev { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("hcore_api={}", level).parse()?),
        )
        .init();

    info!(dev = config.dev, "Starting hcore-api");

    // Message catalog
    let registry = MessageRegistry::new(config.default_language.clone());
    catalog::install(&registry);
    info!(default_language = %config.default_language, "Message catalog installed");

    // Record store
    let store: Arc<dyn RecordStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PgStore::connect(url, config.db_max_connections).await?),
        None => {
            warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    if !config.dev && config.api_key.is_none() {
        warn!("API_KEY not set, all write requests will be rejected");
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState::new(config, registry, store));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
