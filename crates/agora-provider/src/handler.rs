//! Pluggable service handlers

use agora_types::{AgoraError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

/// Produces the payload a paying consumer receives. Implementations carry
/// the provider's actual business logic; the marketplace plumbing never
/// inspects the payload.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    /// Serve one delivery. `request` is the consumer's (possibly empty)
    /// request body.
    async fn handle(&self, task_type: &str, request: &Value) -> Result<Value>;
}

/// Reference handler serving a SOL/USDC price quote.
#[derive(Debug, Clone)]
pub struct PriceFeedHandler {
    source: String,
}

impl PriceFeedHandler {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl Default for PriceFeedHandler {
    fn default() -> Self {
        Self::new("mock_oracle")
    }
}

#[async_trait]
impl ServiceHandler for PriceFeedHandler {
    async fn handle(&self, task_type: &str, request: &Value) -> Result<Value> {
        if task_type != "price_data" {
            return Err(AgoraError::validation(format!(
                "unsupported task type '{task_type}'"
            )));
        }
        let symbol = request["symbol"].as_str().unwrap_or("SOL/USDC");
        let now = Utc::now();
        // Wobble around a base quote so successive calls do not return
        // byte-identical payloads
        let wobble = (now.timestamp_millis() % 200) as f64 / 100.0;
        Ok(json!({
            "symbol": symbol,
            "price": 141.5 + wobble,
            "timestamp": now.to_rfc3339(),
            "source": self.source,
        }))
    }
}
