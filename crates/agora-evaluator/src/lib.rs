//! Agora Evaluator - ranks bids and rates delivered service
//!
//! Two implementations behind one capability:
//!
//! - [`DeterministicEvaluator`]: pure weighted scoring, always available
//! - [`LlmEvaluator`]: prompts an OpenAI-compatible JSON-mode endpoint and
//!   validates the reply; any failure or timeout falls back to the
//!   deterministic path
//!
//! The evaluator only proposes. Selection, payment and rating submission
//! are executed by the consumer loop, never by a model.

mod scoring;
mod deterministic;
mod llm;

use agora_types::{Bid, BidId, Result, Rfp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub use deterministic::DeterministicEvaluator;
pub use llm::{LlmClient, LlmConfig, LlmEvaluator};
pub use scoring::{score_bids, BidScore, ScoreWeights};

/// Per-bid verdict in a ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidVerdict {
    pub bid_id: BidId,
    pub accept: bool,
    pub reason: String,
}

/// Result of ranking a bid set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankOutcome {
    pub winner_bid_id: BidId,
    pub verdicts: Vec<BidVerdict>,
    /// Evaluator's confidence in the pick, in [0, 1]
    pub confidence: f64,
    pub analysis: String,
}

/// Result of rating a delivered service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateOutcome {
    /// Overall stars in [1, 5]
    pub stars: f64,
    pub review: String,
    pub data_quality: f64,
    pub response_time: f64,
    pub value_for_price: f64,
}

/// Bid evaluation capability.
///
/// Both operations are pure with respect to marketplace state: they read
/// the RFP and bids they are given and return a proposal.
#[async_trait]
pub trait BidEvaluator: Send + Sync {
    /// Rank the bid set and pick a winner. Errs with `NoBids` on an empty
    /// set.
    async fn rank(&self, rfp: &Rfp, bids: &[Bid]) -> Result<RankOutcome>;

    /// Rate a delivered service result
    async fn rate(
        &self,
        service_result: &Value,
        latency_ms: u64,
        winning_bid: &Bid,
    ) -> Result<RateOutcome>;
}

/// Which evaluator the process should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorMode {
    Deterministic,
    Llm,
}

impl EvaluatorMode {
    pub fn from_env() -> Self {
        match std::env::var("AGORA_EVALUATOR").as_deref() {
            Ok("llm") => Self::Llm,
            _ => Self::Deterministic,
        }
    }
}

/// Build the configured evaluator. The LLM variant keeps the deterministic
/// evaluator inside as its mandatory fallback.
pub fn evaluator_from_env() -> Arc<dyn BidEvaluator> {
    match EvaluatorMode::from_env() {
        EvaluatorMode::Llm => Arc::new(LlmEvaluator::new(LlmConfig::from_env())),
        EvaluatorMode::Deterministic => Arc::new(DeterministicEvaluator::default()),
    }
}
