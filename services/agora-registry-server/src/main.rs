//! Agora Registry Server
//!
//! Stateful coordination service for the agent marketplace: agent
//! registration and discovery, the RFP/bid lifecycle, assignments and
//! reputation. State is in-memory; a background sweeper expires stale
//! RFPs.

mod config;

use std::sync::Arc;

use agora_registry::{create_router, AppState};
use agora_store::{spawn_expiry_sweeper, InMemoryStore, MarketStore};
use config::ServerConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let store: Arc<dyn MarketStore> = Arc::new(InMemoryStore::new());
    spawn_expiry_sweeper(store.clone(), config.sweep_interval);

    let state = Arc::new(AppState::new(store));
    let app = create_router(state);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "agora registry listening");
    axum::serve(listener, app).await?;
    Ok(())
}
