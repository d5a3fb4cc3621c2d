//! LLM-backed evaluator with mandatory deterministic fallback
//!
//! Talks to any OpenAI-compatible chat-completions endpoint in JSON mode.
//! The model only proposes; its output is parsed and validated, and any
//! failure (transport, timeout, malformed JSON, unknown bid id) drops to
//! the deterministic evaluator.

use std::time::Duration;

use agora_types::{AgoraError, Bid, BidId, Result, Rfp};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{BidEvaluator, BidVerdict, DeterministicEvaluator, RankOutcome, RateOutcome};

const RANK_SYSTEM_PROMPT: &str = "You are an expert at evaluating service provider bids \
in an agent marketplace. Output valid JSON only.";

const RATE_SYSTEM_PROMPT: &str = "You are an expert at evaluating delivered service \
quality. Output valid JSON only.";

/// LLM endpoint configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (e.g. `http://localhost:11434/v1`)
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(20),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("AGORA_LLM_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("AGORA_LLM_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("AGORA_LLM_API_KEY").ok(),
            timeout: defaults.timeout,
        }
    }
}

/// Minimal chat-completions client
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// One-shot JSON-mode completion
    pub async fn complete_json(&self, system: &str, user: &str) -> Result<Value> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.2,
            "max_tokens": 768,
            "response_format": {"type": "json_object"},
        });

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .timeout(self.config.timeout)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AgoraError::Timeout {
                    operation: "llm completion".to_string(),
                    seconds: self.config.timeout.as_secs(),
                }
            } else {
                AgoraError::upstream("llm", e.to_string())
            }
        })?;
        if !response.status().is_success() {
            return Err(AgoraError::upstream(
                "llm",
                format!("HTTP {}", response.status()),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AgoraError::upstream("llm", e.to_string()))?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AgoraError::upstream("llm", "no content in completion"))?;

        serde_json::from_str(strip_code_fences(content))
            .map_err(|_| AgoraError::upstream("llm", "completion is not valid JSON"))
    }
}

/// Models wrap JSON in markdown fences often enough that we strip them
/// before parsing.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

/// Evaluator that asks a model first and falls back to deterministic
/// scoring whenever the model cannot be used or answers garbage.
pub struct LlmEvaluator {
    client: LlmClient,
    fallback: DeterministicEvaluator,
}

impl LlmEvaluator {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: LlmClient::new(config),
            fallback: DeterministicEvaluator::default(),
        }
    }

    async fn llm_rank(&self, rfp: &Rfp, bids: &[Bid]) -> Result<RankOutcome> {
        let user = format!(
            "Task type: {}\nBudget (minor units): {}\nRequirements: {}\n\nBids:\n{}\n\n\
             For each bid decide accept or reject. Pick exactly one winner among the \
             accepted bids.\n\nReturn JSON:\n{{\n  \"winner_bid_id\": \"<uuid>\",\n  \
             \"decisions\": [{{\"bid_id\": \"<uuid>\", \"accept\": true, \"reason\": \"...\"}}],\n  \
             \"confidence\": 0.0,\n  \"analysis\": \"...\"\n}}",
            rfp.task_type,
            rfp.max_budget_usdc.minor(),
            serde_json::to_string(&rfp.requirements).unwrap_or_default(),
            serde_json::to_string_pretty(bids).unwrap_or_default(),
        );

        let reply = self.client.complete_json(RANK_SYSTEM_PROMPT, &user).await?;

        let winner_bid_id = reply["winner_bid_id"]
            .as_str()
            .and_then(|s| BidId::parse(s).ok())
            .ok_or_else(|| AgoraError::upstream("llm", "no winner_bid_id in reply"))?;
        if !bids.iter().any(|b| b.bid_id == winner_bid_id) {
            return Err(AgoraError::upstream(
                "llm",
                "winner_bid_id does not match any bid",
            ));
        }

        let verdicts = reply["decisions"]
            .as_array()
            .map(|decisions| {
                decisions
                    .iter()
                    .filter_map(|d| {
                        let bid_id = d["bid_id"].as_str().and_then(|s| BidId::parse(s).ok())?;
                        bids.iter().find(|b| b.bid_id == bid_id)?;
                        Some(BidVerdict {
                            bid_id,
                            accept: d["accept"].as_bool().unwrap_or(false),
                            reason: d["reason"].as_str().unwrap_or_default().to_string(),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(RankOutcome {
            winner_bid_id,
            verdicts,
            confidence: reply["confidence"].as_f64().unwrap_or(0.5).clamp(0.0, 1.0),
            analysis: reply["analysis"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn llm_rate(
        &self,
        service_result: &Value,
        latency_ms: u64,
        winning_bid: &Bid,
    ) -> Result<RateOutcome> {
        let user = format!(
            "Service result:\n{}\n\nDelivery latency: {latency_ms}ms\n\
             Promised completion: {}ms\nPrice paid: {} minor units\n\n\
             Rate the provider. Return JSON:\n{{\"stars\": 4.5, \"review\": \"...\", \
             \"data_quality\": 5.0, \"response_time\": 4.0, \"value_for_price\": 4.5}}",
            serde_json::to_string_pretty(service_result).unwrap_or_default(),
            winning_bid.estimated_completion_ms.unwrap_or(0),
            winning_bid.bid_price_usdc.minor(),
        );

        let reply = self.client.complete_json(RATE_SYSTEM_PROMPT, &user).await?;
        let stars = reply["stars"]
            .as_f64()
            .ok_or_else(|| AgoraError::upstream("llm", "no stars in reply"))?;

        Ok(RateOutcome {
            stars: stars.clamp(1.0, 5.0),
            review: reply["review"].as_str().unwrap_or_default().to_string(),
            data_quality: reply["data_quality"].as_f64().unwrap_or(3.0).clamp(1.0, 5.0),
            response_time: reply["response_time"].as_f64().unwrap_or(3.0).clamp(1.0, 5.0),
            value_for_price: reply["value_for_price"]
                .as_f64()
                .unwrap_or(3.0)
                .clamp(1.0, 5.0),
        })
    }
}

#[async_trait]
impl BidEvaluator for LlmEvaluator {
    async fn rank(&self, rfp: &Rfp, bids: &[Bid]) -> Result<RankOutcome> {
        if bids.is_empty() {
            return Err(AgoraError::NoBids {
                rfp_id: rfp.rfp_id.to_string(),
            });
        }
        match self.llm_rank(rfp, bids).await {
            Ok(outcome) => {
                debug!(winner = %outcome.winner_bid_id, "llm ranked bids");
                Ok(outcome)
            }
            Err(err) => {
                warn!(error = %err, "llm rank failed, using deterministic fallback");
                self.fallback.rank(rfp, bids).await
            }
        }
    }

    async fn rate(
        &self,
        service_result: &Value,
        latency_ms: u64,
        winning_bid: &Bid,
    ) -> Result<RateOutcome> {
        match self.llm_rate(service_result, latency_ms, winning_bid).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(error = %err, "llm rate failed, using deterministic fallback");
                self.fallback.rate(service_result, latency_ms, winning_bid).await
            }
        }
    }
}
