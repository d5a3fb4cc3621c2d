//! Deterministic evaluator

use agora_types::{AgoraError, Bid, Result, Rfp};
use async_trait::async_trait;
use serde_json::Value;

use crate::{score_bids, BidEvaluator, BidVerdict, RankOutcome, RateOutcome, ScoreWeights};

/// Pure weighted-scoring evaluator. Always available; also serves as the
/// fallback inside [`crate::LlmEvaluator`].
#[derive(Debug, Clone, Default)]
pub struct DeterministicEvaluator {
    weights: ScoreWeights,
}

impl DeterministicEvaluator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }
}

#[async_trait]
impl BidEvaluator for DeterministicEvaluator {
    async fn rank(&self, rfp: &Rfp, bids: &[Bid]) -> Result<RankOutcome> {
        let scores = score_bids(rfp, bids, self.weights);
        let Some(winner) = scores.first() else {
            return Err(AgoraError::NoBids {
                rfp_id: rfp.rfp_id.to_string(),
            });
        };

        let verdicts = scores
            .iter()
            .map(|s| BidVerdict {
                bid_id: s.bid_id,
                accept: s.bid_id == winner.bid_id,
                reason: if s.bid_id == winner.bid_id {
                    format!("highest composite score {:.4}", s.score)
                } else {
                    format!(
                        "outscored by winner ({:.4} vs {:.4})",
                        s.score, winner.score
                    )
                },
            })
            .collect();

        let confidence = if scores.len() == 1 {
            0.9
        } else {
            let margin = winner.score - scores[1].score;
            (0.5 + margin).clamp(0.5, 0.99)
        };

        Ok(RankOutcome {
            winner_bid_id: winner.bid_id,
            verdicts,
            confidence,
            analysis: format!(
                "scored {} bid(s) with weights price={} reputation={} speed={}; \
                 winner {} at {:.4}",
                scores.len(),
                self.weights.price,
                self.weights.reputation,
                self.weights.speed,
                winner.bid_id,
                winner.score
            ),
        })
    }

    async fn rate(
        &self,
        service_result: &Value,
        latency_ms: u64,
        winning_bid: &Bid,
    ) -> Result<RateOutcome> {
        let has_data = match service_result {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        };

        if !has_data {
            return Ok(RateOutcome {
                stars: 2.0,
                review: "delivery completed but the payload was empty".to_string(),
                data_quality: 1.0,
                response_time: 3.0,
                value_for_price: 2.0,
            });
        }

        let on_time = winning_bid
            .estimated_completion_ms
            .map_or(true, |estimate| latency_ms <= estimate.max(1));

        let (stars, response_time, review) = if on_time {
            (
                5.0,
                5.0,
                format!("delivered as promised in {latency_ms}ms"),
            )
        } else {
            (
                4.0,
                3.0,
                format!(
                    "delivered usable data but took {latency_ms}ms against an estimate of {}ms",
                    winning_bid.estimated_completion_ms.unwrap_or(0)
                ),
            )
        };

        Ok(RateOutcome {
            stars,
            review,
            data_quality: 5.0,
            response_time,
            value_for_price: 4.0,
        })
    }
}
