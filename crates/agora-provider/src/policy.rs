//! Bidding policy: should we bid, and at what price

use agora_evaluator::{LlmClient, LlmConfig};
use agora_types::{Rfp, UsdcAmount};
use async_trait::async_trait;
use tracing::{debug, warn};

const BID_SYSTEM_PROMPT: &str = "You are a service provider agent deciding whether to bid \
on a marketplace task. Output valid JSON only.";

/// Outcome of a bidding decision
#[derive(Debug, Clone)]
pub struct BidDecision {
    pub should_bid: bool,
    pub price: UsdcAmount,
    pub estimated_completion_ms: u64,
    pub confidence: f64,
    pub message: String,
}

impl BidDecision {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            should_bid: false,
            price: UsdcAmount::ZERO,
            estimated_completion_ms: 0,
            confidence: 0.0,
            message: reason.into(),
        }
    }
}

/// Decides whether (and how) to bid on an RFP
#[async_trait]
pub trait BidPolicy: Send + Sync {
    async fn decide(&self, rfp: &Rfp, base_price: UsdcAmount) -> BidDecision;
}

/// Bids the advertised base price whenever the budget covers it.
#[derive(Debug, Clone)]
pub struct BasePricePolicy {
    pub estimated_completion_ms: u64,
}

impl Default for BasePricePolicy {
    fn default() -> Self {
        Self {
            estimated_completion_ms: 500,
        }
    }
}

#[async_trait]
impl BidPolicy for BasePricePolicy {
    async fn decide(&self, rfp: &Rfp, base_price: UsdcAmount) -> BidDecision {
        if base_price > rfp.max_budget_usdc {
            return BidDecision::pass(format!(
                "budget {} below base price {}",
                rfp.max_budget_usdc, base_price
            ));
        }
        BidDecision {
            should_bid: true,
            price: base_price,
            estimated_completion_ms: self.estimated_completion_ms,
            confidence: 0.9,
            message: format!("can serve '{}' at the advertised price", rfp.task_type),
        }
    }
}

/// Asks a model for the bid decision, with [`BasePricePolicy`] as the
/// fallback. The model may undercut the base price but never exceed the
/// RFP budget.
pub struct LlmBidPolicy {
    client: LlmClient,
    fallback: BasePricePolicy,
}

impl LlmBidPolicy {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: LlmClient::new(config),
            fallback: BasePricePolicy::default(),
        }
    }
}

#[async_trait]
impl BidPolicy for LlmBidPolicy {
    async fn decide(&self, rfp: &Rfp, base_price: UsdcAmount) -> BidDecision {
        let user = format!(
            "RFP task type: {}\nRequirements: {}\nMax budget (minor units): {}\n\
             Your base price (minor units): {}\n\n\
             Decide whether to bid and at what price. Undercut competitors but do not \
             go below cost.\n\nReturn JSON:\n\
             {{\"should_bid\": true, \"bid_price_minor\": 100, \"estimated_completion_ms\": 500, \
             \"confidence\": 0.9, \"reasoning\": \"...\"}}",
            rfp.task_type,
            serde_json::to_string(&rfp.requirements).unwrap_or_default(),
            rfp.max_budget_usdc.minor(),
            base_price.minor(),
        );

        match self.client.complete_json(BID_SYSTEM_PROMPT, &user).await {
            Ok(reply) => {
                let should_bid = reply["should_bid"].as_bool().unwrap_or(false);
                if !should_bid {
                    let reason = reply["reasoning"].as_str().unwrap_or("model declined");
                    debug!(rfp_id = %rfp.rfp_id, reason, "model declined to bid");
                    return BidDecision::pass(reason.to_string());
                }
                let price = reply["bid_price_minor"]
                    .as_u64()
                    .map(UsdcAmount::from_minor)
                    .unwrap_or(base_price)
                    .min(rfp.max_budget_usdc)
                    .max(UsdcAmount(1));
                BidDecision {
                    should_bid: true,
                    price,
                    estimated_completion_ms: reply["estimated_completion_ms"]
                        .as_u64()
                        .unwrap_or(self.fallback.estimated_completion_ms),
                    confidence: reply["confidence"].as_f64().unwrap_or(0.5).clamp(0.0, 1.0),
                    message: reply["reasoning"].as_str().unwrap_or_default().to_string(),
                }
            }
            Err(err) => {
                warn!(error = %err, "bid policy model failed, using base price");
                self.fallback.decide(rfp, base_price).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_types::{AgentId, RfpId, RfpStatus};
    use chrono::Utc;
    use std::collections::HashMap;

    fn rfp(budget: u64) -> Rfp {
        Rfp {
            rfp_id: RfpId::new(),
            requester_agent_id: AgentId::new("c1"),
            task_type: "price_data".to_string(),
            requirements: HashMap::new(),
            max_budget_usdc: UsdcAmount(budget),
            required_delivery_time_ms: None,
            bidding_deadline: None,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::seconds(300),
            status: RfpStatus::Open,
        }
    }

    #[tokio::test]
    async fn test_base_price_policy_respects_budget() {
        let policy = BasePricePolicy::default();

        let decision = policy.decide(&rfp(200), UsdcAmount(100)).await;
        assert!(decision.should_bid);
        assert_eq!(decision.price, UsdcAmount(100));

        let decision = policy.decide(&rfp(50), UsdcAmount(100)).await;
        assert!(!decision.should_bid);
    }
}
