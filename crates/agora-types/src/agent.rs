//! Agent records and registration

use crate::{AgentId, UsdcAmount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What kind of service an agent provides or consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    DataProvider,
    Consumer,
    Executor,
    Oracle,
    Analytics,
    Custom,
}

/// Agent availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Maintenance,
}

/// A registered agent.
///
/// `capabilities` names the task types the agent can serve; `pricing` maps
/// each capability to the agent's advertised price. `reputation` is the
/// running arithmetic mean of the star ratings the agent has received,
/// in [0, 5].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub name: String,
    pub agent_type: AgentType,
    pub endpoint_url: String,
    pub wallet_address: String,
    pub capabilities: Vec<String>,
    pub pricing: HashMap<String, UsdcAmount>,
    pub status: AgentStatus,
    pub reputation: f64,
    pub rating_count: u64,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Agent {
    /// Advertised price for a capability, if the agent offers it
    pub fn price_for(&self, capability: &str) -> Option<UsdcAmount> {
        self.pricing.get(capability).copied()
    }

    /// Whether the agent advertises the given capability
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Registration request.
///
/// Re-registering an existing `agent_id` updates the record in place and
/// preserves its accumulated reputation and counters. `reputation` seeds
/// the score for an agent with no recorded ratings; once ratings exist the
/// running mean is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub agent_id: AgentId,
    pub name: String,
    pub agent_type: AgentType,
    pub endpoint_url: String,
    pub wallet_address: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub pricing: HashMap<String, UsdcAmount>,
    #[serde(default)]
    pub reputation: Option<f64>,
}

/// Discovery filter for `GET /agents`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentFilter {
    pub agent_type: Option<AgentType>,
    pub capability: Option<String>,
    pub status: Option<AgentStatus>,
}

/// Response body for `GET /agents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentListResponse {
    pub agents: Vec<Agent>,
    pub count: usize,
}
