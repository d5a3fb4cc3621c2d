//! Request/response shapes specific to the HTTP layer
//!
//! The canonical entities live in `agora-types`; this module only holds
//! query-string structs and small endpoint-local bodies.

use agora_types::{AgentStatus, AgentType};
use serde::{Deserialize, Serialize};

/// Query parameters for `GET /agents`
#[derive(Debug, Default, Deserialize)]
pub struct AgentsQuery {
    pub agent_type: Option<AgentType>,
    pub capability: Option<String>,
    pub status: Option<AgentStatus>,
}

/// Query parameters for `GET /rfp/open`
#[derive(Debug, Default, Deserialize)]
pub struct OpenRfpsQuery {
    /// Comma-separated task types; empty means all
    pub task_types: Option<String>,
}

impl OpenRfpsQuery {
    pub fn task_type_list(&self) -> Vec<String> {
        self.task_types
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Query parameters for `GET /rfp/{rfp_id}/evaluate`
#[derive(Debug, Deserialize)]
pub struct EvaluateQuery {
    #[serde(default = "default_price_weight")]
    pub price_weight: f64,
    #[serde(default = "default_reputation_weight")]
    pub reputation_weight: f64,
    #[serde(default = "default_speed_weight")]
    pub speed_weight: f64,
}

fn default_price_weight() -> f64 {
    0.4
}

fn default_reputation_weight() -> f64 {
    0.35
}

fn default_speed_weight() -> f64 {
    0.25
}

/// Query parameters for `GET /agents/{id}/ratings`
#[derive(Debug, Deserialize)]
pub struct RatingsQuery {
    #[serde(default = "default_ratings_limit")]
    pub limit: usize,
}

fn default_ratings_limit() -> usize {
    10
}

/// Body of `POST /agents/{id}/subscribe`
#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub task_type: String,
}

/// Body of `POST /agents/{id}/status`
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: AgentStatus,
}

/// Generic acknowledgement body
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_csv_parsing() {
        let query = OpenRfpsQuery {
            task_types: Some("price_data, analytics ,".to_string()),
        };
        assert_eq!(query.task_type_list(), vec!["price_data", "analytics"]);

        let empty = OpenRfpsQuery { task_types: None };
        assert!(empty.task_type_list().is_empty());
    }
}
