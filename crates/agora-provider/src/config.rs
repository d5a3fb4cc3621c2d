//! Provider configuration

use std::collections::HashMap;
use std::time::Duration;

use agora_types::{AgentId, UsdcAmount};

/// Everything a provider process needs to know about itself and its
/// surroundings. Private keys are not held here: the provider only
/// receives payments and never signs.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub agent_id: AgentId,
    pub name: String,
    pub wallet_address: String,
    /// URL this provider advertises in the registry
    pub endpoint_url: String,
    pub registry_url: String,
    pub facilitator_url: String,
    pub ledger_rpc_url: String,
    pub token_mint: String,
    pub network: String,
    pub capabilities: Vec<String>,
    pub pricing: HashMap<String, UsdcAmount>,
    /// Cadence of the RFP polling loop
    pub poll_interval: Duration,
    /// How long an issued 402 challenge stays valid
    pub challenge_ttl: Duration,
    /// How long accepted signatures are remembered; must cover the
    /// ledger's finality window
    pub replay_ttl: Duration,
}

impl ProviderConfig {
    pub fn new(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        wallet_address: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: AgentId::new(agent_id),
            name: name.into(),
            wallet_address: wallet_address.into(),
            endpoint_url: "http://localhost:5001".to_string(),
            registry_url: "http://localhost:8000".to_string(),
            facilitator_url: "http://localhost:3000".to_string(),
            ledger_rpc_url: "https://api.devnet.solana.com".to_string(),
            token_mint: "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".to_string(),
            network: "solana-devnet".to_string(),
            capabilities: Vec::new(),
            pricing: HashMap::new(),
            poll_interval: Duration::from_secs(3),
            challenge_ttl: Duration::from_secs(120),
            replay_ttl: Duration::from_secs(15 * 60),
        }
    }

    /// Add a priced capability
    pub fn with_capability(mut self, task_type: impl Into<String>, price: UsdcAmount) -> Self {
        let task_type = task_type.into();
        if !self.capabilities.contains(&task_type) {
            self.capabilities.push(task_type.clone());
        }
        self.pricing.insert(task_type, price);
        self
    }

    /// Advertised price for a task type
    pub fn price_for(&self, task_type: &str) -> Option<UsdcAmount> {
        self.pricing.get(task_type).copied()
    }
}
