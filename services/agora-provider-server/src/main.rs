//! Agora Provider Server
//!
//! Registers the provider with the registry, polls for matching RFPs and
//! bids on them, and serves the payment-gated `/deliver` endpoint.

mod config;

use std::sync::Arc;
use std::time::Duration;

use agora_evaluator::LlmConfig;
use agora_provider::{
    BasePricePolicy, BidPolicy, LlmBidPolicy, PriceFeedHandler, ProviderAgent,
};
use config::{PolicyKind, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const REGISTER_ATTEMPTS: u32 = 10;
const REGISTER_BACKOFF: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let policy: Arc<dyn BidPolicy> = match config.policy {
        PolicyKind::Llm => Arc::new(LlmBidPolicy::new(LlmConfig::from_env())),
        PolicyKind::BasePrice => Arc::new(BasePricePolicy::default()),
    };

    let agent = Arc::new(ProviderAgent::new(
        config.provider.clone(),
        policy,
        Arc::new(PriceFeedHandler::default()),
    ));

    // The registry may come up after us; keep trying before giving up.
    let mut registered = false;
    for attempt in 1..=REGISTER_ATTEMPTS {
        match agent.register().await {
            Ok(()) => {
                registered = true;
                break;
            }
            Err(err) => {
                warn!(attempt, error = %err, "registration failed, retrying");
                tokio::time::sleep(REGISTER_BACKOFF).await;
            }
        }
    }
    if !registered {
        anyhow::bail!("could not register with the registry");
    }

    agent.clone().spawn_polling();

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, agent_id = %config.provider.agent_id, "agora provider listening");
    axum::serve(listener, agent.router()).await?;
    Ok(())
}
