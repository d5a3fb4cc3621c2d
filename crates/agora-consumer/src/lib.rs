//! Agora Consumer - the buyer side of the marketplace
//!
//! One call, [`ConsumerAgent::request_service`], runs the whole flow:
//!
//! 1. broadcast an RFP with a bidding deadline
//! 2. poll for bids until the deadline, streaming arrivals to the log
//! 3. rank bids through the configured evaluator
//! 4. select the winner at the registry (the commit point)
//! 5. pay and fetch through the x402 client (single settlement)
//! 6. record the delivery signature at the registry
//! 7. rate the provider
//!
//! The result is a discriminated [`ServiceOutcome`]; a settled signature
//! is always present in it, success or not.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agora_client::RegistryClient;
use agora_evaluator::BidEvaluator;
use agora_payments::X402Client;
use agora_types::{
    AgentId, AgoraError, AssignmentId, Bid, CreateRfp, RateRequest, RfpId, SelectWinner,
    UsdcAmount,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Consumer configuration
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub agent_id: AgentId,
    pub wallet_address: String,
    pub registry_url: String,
    pub network: String,
    /// Bid collection window
    pub bid_window: Duration,
    /// How often to poll for bids while waiting
    pub bid_poll_interval: Duration,
    /// End-to-end deadline for one service request
    pub overall_deadline: Duration,
    /// Delivery attempts; only transport-level failures before any
    /// settlement are retried
    pub delivery_attempts: u32,
}

impl ConsumerConfig {
    pub fn new(
        agent_id: impl Into<String>,
        wallet_address: impl Into<String>,
        registry_url: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: AgentId::new(agent_id),
            wallet_address: wallet_address.into(),
            registry_url: registry_url.into(),
            network: "solana-devnet".to_string(),
            bid_window: Duration::from_secs(10),
            bid_poll_interval: Duration::from_secs(1),
            overall_deadline: Duration::from_secs(60),
            delivery_attempts: 2,
        }
    }
}

/// What the consumer wants done
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub task_type: String,
    pub requirements: HashMap<String, Value>,
    pub max_budget_usdc: UsdcAmount,
    pub required_delivery_time_ms: Option<u64>,
    pub expires_in_seconds: u64,
}

impl ServiceRequest {
    pub fn new(task_type: impl Into<String>, max_budget_usdc: UsdcAmount) -> Self {
        Self {
            task_type: task_type.into(),
            requirements: HashMap::new(),
            max_budget_usdc,
            required_delivery_time_ms: None,
            expires_in_seconds: 300,
        }
    }
}

/// Discriminated result of a service request
#[derive(Debug, Clone, Serialize)]
pub struct ServiceOutcome {
    pub ok: bool,
    pub error_kind: Option<String>,
    /// Settled on-chain signature, if any payment happened
    pub signature: Option<String>,
    /// Provider response body on success
    pub data: Option<Value>,
    pub reason: String,
    pub rfp_id: Option<RfpId>,
    pub assignment_id: Option<AssignmentId>,
    pub provider_agent_id: Option<AgentId>,
    pub bids_received: usize,
    pub stars_given: Option<f64>,
}

impl ServiceOutcome {
    fn failure(err: &AgoraError) -> Self {
        Self {
            ok: false,
            error_kind: Some(err.error_code().to_string()),
            signature: err.settled_signature().map(str::to_string),
            data: None,
            reason: err.to_string(),
            rfp_id: None,
            assignment_id: None,
            provider_agent_id: None,
            bids_received: 0,
            stars_given: None,
        }
    }
}

/// The consumer agent
pub struct ConsumerAgent {
    config: ConsumerConfig,
    registry: RegistryClient,
    evaluator: Arc<dyn BidEvaluator>,
    x402: X402Client,
}

impl ConsumerAgent {
    pub fn new(
        config: ConsumerConfig,
        evaluator: Arc<dyn BidEvaluator>,
        x402: X402Client,
    ) -> Self {
        let registry = RegistryClient::new(config.registry_url.clone());
        Self {
            config,
            registry,
            evaluator,
            x402,
        }
    }

    /// Run the full marketplace flow for one service request.
    pub async fn request_service(&self, request: ServiceRequest) -> ServiceOutcome {
        match tokio::time::timeout(self.config.overall_deadline, self.run(request)).await {
            Ok(outcome) => outcome,
            Err(_) => ServiceOutcome::failure(&AgoraError::Timeout {
                operation: "service request".to_string(),
                seconds: self.config.overall_deadline.as_secs(),
            }),
        }
    }

    async fn run(&self, request: ServiceRequest) -> ServiceOutcome {
        // Step 1: broadcast the RFP
        let create = CreateRfp {
            requester_agent_id: self.config.agent_id.clone(),
            task_type: request.task_type.clone(),
            requirements: request.requirements.clone(),
            max_budget_usdc: request.max_budget_usdc,
            required_delivery_time_ms: request.required_delivery_time_ms,
            expires_in_seconds: request.expires_in_seconds,
            bidding_window_seconds: Some(self.config.bid_window.as_secs().max(1)),
        };
        let rfp = match self.registry.create_rfp(&create).await {
            Ok(rfp) => rfp,
            Err(err) => return ServiceOutcome::failure(&err),
        };
        info!(
            rfp_id = %rfp.rfp_id,
            task_type = %rfp.task_type,
            budget = %rfp.max_budget_usdc,
            "RFP broadcast"
        );

        // Step 2: collect bids until the deadline
        let bids = self.collect_bids(&rfp.rfp_id).await;

        // Step 3: nothing came in
        if bids.is_empty() {
            let err = AgoraError::NoBids {
                rfp_id: rfp.rfp_id.to_string(),
            };
            return ServiceOutcome {
                rfp_id: Some(rfp.rfp_id),
                ..ServiceOutcome::failure(&err)
            };
        }
        info!(count = bids.len(), "bid window closed");

        // Step 4: rank
        let ranking = match self.evaluator.rank(&rfp, &bids).await {
            Ok(ranking) => ranking,
            Err(err) => {
                return ServiceOutcome {
                    rfp_id: Some(rfp.rfp_id),
                    bids_received: bids.len(),
                    ..ServiceOutcome::failure(&err)
                }
            }
        };
        let winning_bid = bids
            .iter()
            .find(|b| b.bid_id == ranking.winner_bid_id)
            .cloned();
        let Some(winning_bid) = winning_bid else {
            let err = AgoraError::validation("evaluator picked an unknown bid");
            return ServiceOutcome {
                rfp_id: Some(rfp.rfp_id),
                bids_received: bids.len(),
                ..ServiceOutcome::failure(&err)
            };
        };
        info!(
            winner = %winning_bid.bidder_agent_id,
            price = %winning_bid.bid_price_usdc,
            confidence = ranking.confidence,
            "winner picked"
        );

        // Step 5: the commit point. Before this we can abort freely;
        // after it we must drive delivery to a terminal state.
        let assignment = match self
            .registry
            .select_winner(
                &rfp.rfp_id,
                &SelectWinner {
                    bid_id: winning_bid.bid_id,
                    selector_agent_id: self.config.agent_id.clone(),
                },
            )
            .await
        {
            Ok(assignment) => assignment,
            Err(err) => {
                return ServiceOutcome {
                    rfp_id: Some(rfp.rfp_id),
                    bids_received: bids.len(),
                    ..ServiceOutcome::failure(&err)
                }
            }
        };

        let outcome_base = ServiceOutcome {
            ok: false,
            error_kind: None,
            signature: None,
            data: None,
            reason: String::new(),
            rfp_id: Some(rfp.rfp_id),
            assignment_id: Some(assignment.assignment_id),
            provider_agent_id: Some(assignment.provider_agent_id.clone()),
            bids_received: bids.len(),
            stars_given: None,
        };

        // Step 6: look up the winner's endpoint and pay-and-fetch
        let provider = match self.registry.get_agent(&assignment.provider_agent_id).await {
            Ok(provider) => provider,
            Err(err) => {
                return ServiceOutcome {
                    error_kind: Some(err.error_code().to_string()),
                    reason: err.to_string(),
                    ..outcome_base
                }
            }
        };
        let deliver_url = format!("{}/deliver", provider.endpoint_url.trim_end_matches('/'));
        let deliver_body = json!({
            "task_type": rfp.task_type,
            "rfp_id": rfp.rfp_id,
            "assignment_id": assignment.assignment_id,
            "requirements": rfp.requirements,
        });

        let started = Instant::now();
        let paid = {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match self
                    .x402
                    .post(&deliver_url, &deliver_body, assignment.agreed_price_usdc)
                    .await
                {
                    Ok(paid) => break paid,
                    // The x402 client only surfaces retriable errors from
                    // before any settlement attempt; settle-stage transport
                    // failures come back terminal. Re-entering the payment
                    // flow here therefore cannot pay twice.
                    Err(err)
                        if err.is_retriable() && attempt < self.config.delivery_attempts =>
                    {
                        warn!(attempt, error = %err, "delivery attempt failed, retrying");
                        continue;
                    }
                    Err(err) => {
                        // A settled signature must survive the failure:
                        // push it to the registry best-effort and surface
                        // it in the outcome.
                        if let Some(signature) = err.settled_signature() {
                            if let Err(post_err) = self
                                .registry
                                .record_delivery(&assignment.assignment_id, signature)
                                .await
                            {
                                warn!(error = %post_err, "could not record settled signature");
                            }
                        }
                        return ServiceOutcome {
                            error_kind: Some(err.error_code().to_string()),
                            signature: err.settled_signature().map(str::to_string),
                            reason: err.to_string(),
                            ..outcome_base
                        };
                    }
                }
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        // Step 7: record the delivery
        if let Some(signature) = &paid.signature {
            if let Err(err) = self
                .registry
                .record_delivery(&assignment.assignment_id, signature)
                .await
            {
                warn!(error = %err, "delivery record failed");
            }
        }

        // Step 8: rate the provider
        let service_data = paid.data.get("service_data").cloned().unwrap_or(Value::Null);
        let stars_given = match self
            .evaluator
            .rate(&service_data, latency_ms, &winning_bid)
            .await
        {
            Ok(rating) => {
                let request = RateRequest {
                    rater_agent_id: self.config.agent_id.clone(),
                    assignment_id: assignment.assignment_id,
                    stars: rating.stars,
                    review_text: rating.review.clone(),
                    data_quality: rating.data_quality,
                    response_time: rating.response_time,
                    value_for_price: rating.value_for_price,
                };
                match self
                    .registry
                    .rate_agent(&assignment.provider_agent_id, &request)
                    .await
                {
                    Ok(_) => {
                        info!(stars = rating.stars, "provider rated");
                        Some(rating.stars)
                    }
                    Err(err) => {
                        warn!(error = %err, "rating submission failed");
                        None
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "rating evaluation failed");
                None
            }
        };

        info!(
            signature = paid.signature.as_deref().unwrap_or("none"),
            latency_ms,
            "service request completed"
        );
        ServiceOutcome {
            ok: true,
            signature: paid.signature,
            data: Some(paid.data),
            reason: "service delivered".to_string(),
            stars_given,
            ..outcome_base
        }
    }

    /// Poll for bids at a steady cadence until the window closes, logging
    /// each new arrival.
    async fn collect_bids(&self, rfp_id: &RfpId) -> Vec<Bid> {
        let deadline = Instant::now() + self.config.bid_window;
        let mut last_count = 0;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let sleep_for = self.config.bid_poll_interval.min(deadline - now);
            tokio::time::sleep(sleep_for).await;

            match self.registry.bids(rfp_id).await {
                Ok(bids) => {
                    for bid in bids.iter().skip(last_count) {
                        info!(
                            bidder = %bid.bidder_agent_id,
                            price = %bid.bid_price_usdc,
                            eta_ms = bid.estimated_completion_ms.unwrap_or(0),
                            "bid received"
                        );
                    }
                    last_count = bids.len().max(last_count);
                }
                Err(err) => {
                    debug!(error = %err, "bid poll failed, will retry");
                }
            }
        }

        self.registry.bids(rfp_id).await.unwrap_or_default()
    }
}
