//! Bookstore service - catalog, carts and checkout

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookstore::auth::TokenVerifier;
use bookstore::catalog::CatalogGateway;
use bookstore::config::StoreBackend;
use bookstore::store::{MemoryStore, PgStore, Store};
use bookstore::{build_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("loading configuration")?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::debug!(?config, "configuration loaded");

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().context("DATABASE_URL is required for the postgres backend")?;
            Arc::new(PgStore::connect(url, config.database_max_connections).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; carts and orders are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let catalog = CatalogGateway::new(config.catalog.clone())?;
    let state = AppState::new(store, catalog, TokenVerifier::new(&config.jwt_secret), config.expose_errors);
    let app = build_router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, backend = ?config.store_backend, "bookstore listening");
    axum::serve(listener, app).await?;
    Ok(())
}
