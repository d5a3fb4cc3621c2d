//! Weighted bid scoring
//!
//! `score = w_price * (budget - price) / budget
//!        + w_rep   * reputation / 5
//!        + w_speed * max(0, 1 - eta / required)`
//!
//! The speed term contributes nothing when the RFP states no required
//! delivery time or the bid carries no estimate. Ties break toward the
//! lower price, then the earlier bid.

use agora_types::{AgentId, Bid, BidId, Rfp};
use serde::{Deserialize, Serialize};

/// Scoring weights. The defaults are (price 0.4, reputation 0.35,
/// speed 0.25).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub price: f64,
    pub reputation: f64,
    pub speed: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price: 0.4,
            reputation: 0.35,
            speed: 0.25,
        }
    }
}

/// One bid's score breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidScore {
    pub bid_id: BidId,
    pub bidder_agent_id: AgentId,
    pub score: f64,
    pub price_score: f64,
    pub reputation_score: f64,
    pub speed_score: f64,
}

/// Score every bid against the RFP, best first.
pub fn score_bids(rfp: &Rfp, bids: &[Bid], weights: ScoreWeights) -> Vec<BidScore> {
    let budget = rfp.max_budget_usdc.minor() as f64;

    let mut scored: Vec<(BidScore, &Bid)> = bids
        .iter()
        .map(|bid| {
            let price_score = if budget > 0.0 {
                (budget - bid.bid_price_usdc.minor() as f64).max(0.0) / budget
            } else {
                0.0
            };
            let reputation_score = (bid.reputation_score / 5.0).clamp(0.0, 1.0);
            let speed_score = match (rfp.required_delivery_time_ms, bid.estimated_completion_ms) {
                (Some(required), Some(eta)) if required > 0 => {
                    (1.0 - eta as f64 / required as f64).max(0.0)
                }
                _ => 0.0,
            };

            let score = weights.price * price_score
                + weights.reputation * reputation_score
                + weights.speed * speed_score;

            (
                BidScore {
                    bid_id: bid.bid_id,
                    bidder_agent_id: bid.bidder_agent_id.clone(),
                    score,
                    price_score,
                    reputation_score,
                    speed_score,
                },
                bid,
            )
        })
        .collect();

    scored.sort_by(|(a, bid_a), (b, bid_b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| bid_a.bid_price_usdc.cmp(&bid_b.bid_price_usdc))
            .then_with(|| bid_a.created_at.cmp(&bid_b.created_at))
    });

    scored.into_iter().map(|(score, _)| score).collect()
}
