//! Provider server configuration

use std::time::Duration;

use agora_provider::ProviderConfig;
use agora_types::UsdcAmount;

/// Which bidding policy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    BasePrice,
    Llm,
}

/// Provider server settings, assembled from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub provider: ProviderConfig,
    pub host: String,
    pub port: u16,
    pub policy: PolicyKind,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let agent_id = env_or("AGORA_AGENT_ID", "provider_001");
        let name = env_or("AGORA_AGENT_NAME", "Agora Price Provider");
        let wallet_address = std::env::var("AGORA_WALLET_ADDRESS")
            .map_err(|_| anyhow::anyhow!("AGORA_WALLET_ADDRESS must be set"))?;

        let host = env_or("AGORA_PROVIDER_HOST", "0.0.0.0");
        let port: u16 = env_parse("AGORA_PROVIDER_PORT", 5001);

        let capability = env_or("AGORA_CAPABILITY", "price_data");
        let base_price = UsdcAmount::from_minor(env_parse("AGORA_BASE_PRICE_MINOR", 100));

        let mut provider = ProviderConfig::new(agent_id, name, wallet_address)
            .with_capability(capability, base_price);
        provider.endpoint_url = env_or(
            "AGORA_ENDPOINT_URL",
            &format!("http://localhost:{port}"),
        );
        provider.registry_url = env_or("AGORA_REGISTRY_URL", "http://localhost:8000");
        provider.facilitator_url = env_or("AGORA_FACILITATOR_URL", "http://localhost:3000");
        provider.ledger_rpc_url = env_or("AGORA_LEDGER_RPC_URL", "https://api.devnet.solana.com");
        provider.token_mint = env_or(
            "AGORA_TOKEN_MINT",
            "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
        );
        provider.network = env_or("AGORA_NETWORK", "solana-devnet");
        provider.poll_interval = Duration::from_secs(env_parse("AGORA_POLL_INTERVAL_SECS", 3));

        let policy = match env_or("AGORA_BID_POLICY", "base").as_str() {
            "llm" => PolicyKind::Llm,
            _ => PolicyKind::BasePrice,
        };

        Ok(Self {
            provider,
            host,
            port,
            policy,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
