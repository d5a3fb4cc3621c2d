//! Market store trait and in-memory implementation

use std::collections::{HashMap, HashSet};

use agora_types::{
    Agent, AgentFilter, AgentId, AgentRegistration, AgentStatus, AgoraError, Assignment,
    AssignmentId, AssignmentStatus, Bid, BidId, CreateRfp, RateRequest, Rating, RatingId,
    ReputationSummary, Result, Rfp, RfpId, RfpStatus, SubmitBid, star_bucket,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Registry-wide counters, served by `GET /rfp/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_agents: usize,
    pub total_rfps: usize,
    pub open_rfps: usize,
    pub total_bids: usize,
    pub total_assignments: usize,
    pub total_ratings: usize,
}

/// Authoritative marketplace state.
///
/// Every operation is atomic: callers never observe a half-applied
/// mutation. Write operations identify their caller by agent ID and the
/// store enforces who may select, cancel, bid and rate.
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn register_agent(&self, registration: AgentRegistration) -> Result<Agent>;
    async fn unregister_agent(&self, agent_id: &AgentId) -> Result<()>;
    async fn get_agent(&self, agent_id: &AgentId) -> Result<Agent>;
    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>>;
    async fn set_agent_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<Agent>;

    async fn subscribe(&self, agent_id: &AgentId, task_type: &str) -> Result<()>;
    async fn unsubscribe(&self, agent_id: &AgentId, task_type: &str) -> Result<()>;

    async fn create_rfp(&self, request: CreateRfp) -> Result<Rfp>;
    async fn get_rfp(&self, rfp_id: &RfpId) -> Result<Rfp>;
    async fn list_open_rfps(&self, task_types: &[String]) -> Result<Vec<Rfp>>;
    async fn cancel_rfp(&self, rfp_id: &RfpId, caller: &AgentId) -> Result<Rfp>;

    async fn submit_bid(&self, rfp_id: &RfpId, bid: SubmitBid) -> Result<Bid>;
    async fn list_bids(&self, rfp_id: &RfpId) -> Result<Vec<Bid>>;

    async fn select_winner(
        &self,
        rfp_id: &RfpId,
        bid_id: &BidId,
        selector: &AgentId,
    ) -> Result<Assignment>;
    async fn get_assignment(&self, assignment_id: &AssignmentId) -> Result<Assignment>;
    async fn record_delivery(
        &self,
        assignment_id: &AssignmentId,
        tx_signature: &str,
    ) -> Result<Assignment>;

    async fn rate(&self, rated_agent_id: &AgentId, request: RateRequest) -> Result<Rating>;
    async fn reputation(&self, agent_id: &AgentId) -> Result<ReputationSummary>;
    async fn list_ratings(&self, agent_id: &AgentId, limit: usize) -> Result<Vec<Rating>>;

    async fn stats(&self) -> Result<RegistryStats>;

    /// Move stale RFPs to `bidding_closed`/`expired`. Returns how many
    /// records changed. Called by the background sweeper.
    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[derive(Default)]
struct Inner {
    agents: HashMap<AgentId, Agent>,
    subscriptions: HashMap<AgentId, HashSet<String>>,
    rfps: HashMap<RfpId, Rfp>,
    bids: HashMap<RfpId, Vec<Bid>>,
    assignments: HashMap<AssignmentId, Assignment>,
    assignment_by_rfp: HashMap<RfpId, AssignmentId>,
    ratings: HashMap<AgentId, Vec<Rating>>,
    rated_assignments: HashSet<(AgentId, AssignmentId)>,
}

/// In-memory store guarded by a single reader/writer lock.
///
/// One lock is deliberate: winner selection must observe the RFP, its bids
/// and the assignment index in one atomic step so concurrent select calls
/// cannot both succeed. The expected load (tens of RFPs per second) is far
/// below what this costs.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn register_agent(&self, registration: AgentRegistration) -> Result<Agent> {
        if registration.agent_id.is_empty() {
            return Err(AgoraError::validation("agent_id must not be empty"));
        }
        if registration.wallet_address.is_empty() {
            return Err(AgoraError::validation("wallet_address must not be empty"));
        }
        if registration.endpoint_url.is_empty() {
            return Err(AgoraError::validation("endpoint_url must not be empty"));
        }

        let now = Utc::now();
        let seed = registration.reputation.map(|r| r.clamp(0.0, 5.0));
        let mut inner = self.inner.write().await;

        let agent = match inner.agents.get_mut(&registration.agent_id) {
            Some(existing) => {
                existing.name = registration.name;
                existing.agent_type = registration.agent_type;
                existing.endpoint_url = registration.endpoint_url;
                existing.wallet_address = registration.wallet_address;
                existing.capabilities = registration.capabilities;
                existing.pricing = registration.pricing;
                existing.last_seen = now;
                // A seed never overrides earned reputation
                if existing.rating_count == 0 {
                    if let Some(seed) = seed {
                        existing.reputation = seed;
                    }
                }
                existing.clone()
            }
            None => {
                let agent = Agent {
                    agent_id: registration.agent_id.clone(),
                    name: registration.name,
                    agent_type: registration.agent_type,
                    endpoint_url: registration.endpoint_url,
                    wallet_address: registration.wallet_address,
                    capabilities: registration.capabilities,
                    pricing: registration.pricing,
                    status: AgentStatus::Active,
                    reputation: seed.unwrap_or(0.0),
                    rating_count: 0,
                    total_tasks: 0,
                    successful_tasks: 0,
                    created_at: now,
                    last_seen: now,
                };
                inner
                    .agents
                    .insert(registration.agent_id.clone(), agent.clone());
                agent
            }
        };

        info!(agent_id = %agent.agent_id, agent_type = ?agent.agent_type, "agent registered");
        Ok(agent)
    }

    async fn unregister_agent(&self, agent_id: &AgentId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.agents.remove(agent_id).is_none() {
            return Err(AgoraError::not_found("agent", agent_id.as_str()));
        }
        inner.subscriptions.remove(agent_id);
        Ok(())
    }

    async fn get_agent(&self, agent_id: &AgentId) -> Result<Agent> {
        self.inner
            .read()
            .await
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| AgoraError::not_found("agent", agent_id.as_str()))
    }

    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>> {
        let inner = self.inner.read().await;
        let mut agents: Vec<Agent> = inner
            .agents
            .values()
            .filter(|a| {
                if let Some(agent_type) = filter.agent_type {
                    if a.agent_type != agent_type {
                        return false;
                    }
                }
                if let Some(status) = filter.status {
                    if a.status != status {
                        return false;
                    }
                }
                if let Some(ref capability) = filter.capability {
                    if !a.has_capability(capability) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(agents)
    }

    async fn set_agent_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<Agent> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| AgoraError::not_found("agent", agent_id.as_str()))?;
        agent.status = status;
        agent.last_seen = Utc::now();
        Ok(agent.clone())
    }

    async fn subscribe(&self, agent_id: &AgentId, task_type: &str) -> Result<()> {
        if task_type.is_empty() {
            return Err(AgoraError::validation("task_type must not be empty"));
        }
        let mut inner = self.inner.write().await;
        if !inner.agents.contains_key(agent_id) {
            return Err(AgoraError::not_found("agent", agent_id.as_str()));
        }
        inner
            .subscriptions
            .entry(agent_id.clone())
            .or_default()
            .insert(task_type.to_string());
        debug!(agent_id = %agent_id, task_type, "subscription added");
        Ok(())
    }

    async fn unsubscribe(&self, agent_id: &AgentId, task_type: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.agents.contains_key(agent_id) {
            return Err(AgoraError::not_found("agent", agent_id.as_str()));
        }
        if let Some(topics) = inner.subscriptions.get_mut(agent_id) {
            topics.remove(task_type);
        }
        Ok(())
    }

    async fn create_rfp(&self, request: CreateRfp) -> Result<Rfp> {
        if request.task_type.is_empty() {
            return Err(AgoraError::validation("task_type must not be empty"));
        }
        if request.max_budget_usdc.is_zero() {
            return Err(AgoraError::validation("max_budget_usdc must be positive"));
        }
        if request.expires_in_seconds == 0 {
            return Err(AgoraError::validation("expires_in_seconds must be positive"));
        }

        let now = Utc::now();
        let rfp = Rfp {
            rfp_id: RfpId::new(),
            requester_agent_id: request.requester_agent_id,
            task_type: request.task_type,
            requirements: request.requirements,
            max_budget_usdc: request.max_budget_usdc,
            required_delivery_time_ms: request.required_delivery_time_ms,
            bidding_deadline: request
                .bidding_window_seconds
                .map(|s| now + Duration::seconds(s as i64)),
            created_at: now,
            expires_at: now + Duration::seconds(request.expires_in_seconds as i64),
            status: RfpStatus::Open,
        };

        let mut inner = self.inner.write().await;
        inner.rfps.insert(rfp.rfp_id, rfp.clone());
        info!(
            rfp_id = %rfp.rfp_id,
            task_type = %rfp.task_type,
            budget = %rfp.max_budget_usdc,
            "RFP broadcast"
        );
        Ok(rfp)
    }

    async fn get_rfp(&self, rfp_id: &RfpId) -> Result<Rfp> {
        self.inner
            .read()
            .await
            .rfps
            .get(rfp_id)
            .cloned()
            .ok_or_else(|| AgoraError::not_found("RFP", rfp_id.to_string()))
    }

    async fn list_open_rfps(&self, task_types: &[String]) -> Result<Vec<Rfp>> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        let mut rfps: Vec<Rfp> = inner
            .rfps
            .values()
            .filter(|rfp| {
                rfp.accepts_bids_at(now)
                    && (task_types.is_empty() || task_types.contains(&rfp.task_type))
            })
            .cloned()
            .collect();
        rfps.sort_by_key(|rfp| rfp.created_at);
        Ok(rfps)
    }

    async fn cancel_rfp(&self, rfp_id: &RfpId, caller: &AgentId) -> Result<Rfp> {
        let mut inner = self.inner.write().await;
        let rfp = inner
            .rfps
            .get_mut(rfp_id)
            .ok_or_else(|| AgoraError::not_found("RFP", rfp_id.to_string()))?;
        if &rfp.requester_agent_id != caller {
            return Err(AgoraError::unauthorized(
                "only the RFP requester may cancel it",
            ));
        }
        if !rfp.status.can_transition_to(RfpStatus::Cancelled) {
            return Err(AgoraError::conflict(format!(
                "RFP {} cannot be cancelled from status {:?}",
                rfp_id, rfp.status
            )));
        }
        rfp.status = RfpStatus::Cancelled;
        Ok(rfp.clone())
    }

    async fn submit_bid(&self, rfp_id: &RfpId, request: SubmitBid) -> Result<Bid> {
        if request.bid_price_usdc.is_zero() {
            return Err(AgoraError::validation("bid_price_usdc must be positive"));
        }

        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let rfp = inner
            .rfps
            .get(rfp_id)
            .ok_or_else(|| AgoraError::not_found("RFP", rfp_id.to_string()))?;

        if rfp.status != RfpStatus::Open || now >= rfp.expires_at {
            return Err(AgoraError::conflict(format!(
                "RFP {} is not open for bids",
                rfp_id
            )));
        }
        if let Some(deadline) = rfp.bidding_deadline {
            if now > deadline {
                return Err(AgoraError::validation(format!(
                    "bidding deadline for RFP {} has passed",
                    rfp_id
                )));
            }
        }
        if request.bid_price_usdc > rfp.max_budget_usdc {
            return Err(AgoraError::validation(format!(
                "bid of {} exceeds RFP budget of {}",
                request.bid_price_usdc, rfp.max_budget_usdc
            )));
        }

        let bidder = inner
            .agents
            .get(&request.bidder_agent_id)
            .ok_or_else(|| AgoraError::not_found("agent", request.bidder_agent_id.as_str()))?;

        let bid = Bid {
            bid_id: BidId::new(),
            rfp_id: *rfp_id,
            bidder_agent_id: request.bidder_agent_id.clone(),
            bidder_name: bidder.name.clone(),
            bid_price_usdc: request.bid_price_usdc,
            estimated_completion_ms: request.estimated_completion_ms,
            confidence_score: request.confidence_score.clamp(0.0, 1.0),
            reputation_score: bidder.reputation,
            message: request.message,
            created_at: now,
            expires_at: request.expires_at,
        };

        // Replace semantics: a re-bid supersedes the bidder's prior offer
        let bids = inner.bids.entry(*rfp_id).or_default();
        bids.retain(|b| b.bidder_agent_id != bid.bidder_agent_id);
        bids.push(bid.clone());

        info!(
            bid_id = %bid.bid_id,
            rfp_id = %rfp_id,
            bidder = %bid.bidder_agent_id,
            price = %bid.bid_price_usdc,
            "bid submitted"
        );
        Ok(bid)
    }

    async fn list_bids(&self, rfp_id: &RfpId) -> Result<Vec<Bid>> {
        let inner = self.inner.read().await;
        if !inner.rfps.contains_key(rfp_id) {
            return Err(AgoraError::not_found("RFP", rfp_id.to_string()));
        }
        Ok(inner.bids.get(rfp_id).cloned().unwrap_or_default())
    }

    async fn select_winner(
        &self,
        rfp_id: &RfpId,
        bid_id: &BidId,
        selector: &AgentId,
    ) -> Result<Assignment> {
        let mut inner = self.inner.write().await;

        let rfp = inner
            .rfps
            .get(rfp_id)
            .ok_or_else(|| AgoraError::not_found("RFP", rfp_id.to_string()))?;
        if &rfp.requester_agent_id != selector {
            return Err(AgoraError::unauthorized(
                "only the RFP requester may select a winner",
            ));
        }
        if inner.assignment_by_rfp.contains_key(rfp_id) {
            return Err(AgoraError::conflict(format!(
                "RFP {} already has an assignment",
                rfp_id
            )));
        }
        if !rfp.status.can_transition_to(RfpStatus::Assigned) {
            return Err(AgoraError::conflict(format!(
                "RFP {} cannot be assigned from status {:?}",
                rfp_id, rfp.status
            )));
        }

        let bid = inner
            .bids
            .get(rfp_id)
            .and_then(|bids| bids.iter().find(|b| &b.bid_id == bid_id))
            .cloned()
            .ok_or_else(|| AgoraError::not_found("bid", bid_id.to_string()))?;

        let assignment = Assignment {
            assignment_id: AssignmentId::new(),
            rfp_id: *rfp_id,
            winning_bid_id: *bid_id,
            provider_agent_id: bid.bidder_agent_id.clone(),
            consumer_agent_id: selector.clone(),
            agreed_price_usdc: bid.bid_price_usdc,
            status: AssignmentStatus::PendingPayment,
            payment_tx_signature: None,
            created_at: Utc::now(),
            delivered_at: None,
        };

        inner
            .assignment_by_rfp
            .insert(*rfp_id, assignment.assignment_id);
        inner
            .assignments
            .insert(assignment.assignment_id, assignment.clone());
        if let Some(rfp) = inner.rfps.get_mut(rfp_id) {
            rfp.status = RfpStatus::Assigned;
        }

        info!(
            assignment_id = %assignment.assignment_id,
            rfp_id = %rfp_id,
            winner = %assignment.provider_agent_id,
            price = %assignment.agreed_price_usdc,
            "winner selected"
        );
        Ok(assignment)
    }

    async fn get_assignment(&self, assignment_id: &AssignmentId) -> Result<Assignment> {
        self.inner
            .read()
            .await
            .assignments
            .get(assignment_id)
            .cloned()
            .ok_or_else(|| AgoraError::not_found("assignment", assignment_id.to_string()))
    }

    async fn record_delivery(
        &self,
        assignment_id: &AssignmentId,
        tx_signature: &str,
    ) -> Result<Assignment> {
        if tx_signature.is_empty() {
            return Err(AgoraError::validation("tx_signature must not be empty"));
        }

        let mut inner = self.inner.write().await;
        let assignment = inner
            .assignments
            .get_mut(assignment_id)
            .ok_or_else(|| AgoraError::not_found("assignment", assignment_id.to_string()))?;

        match assignment.payment_tx_signature.as_deref() {
            // Idempotent re-post of the same signature
            Some(existing) if existing == tx_signature => return Ok(assignment.clone()),
            Some(_) => {
                return Err(AgoraError::conflict(format!(
                    "assignment {} already has a delivery record",
                    assignment_id
                )))
            }
            None => {}
        }

        assignment.payment_tx_signature = Some(tx_signature.to_string());
        assignment.status = AssignmentStatus::Delivered;
        assignment.delivered_at = Some(Utc::now());
        let assignment = assignment.clone();

        if let Some(rfp) = inner.rfps.get_mut(&assignment.rfp_id) {
            if rfp.status.can_transition_to(RfpStatus::Completed) {
                rfp.status = RfpStatus::Completed;
            }
        }
        if let Some(provider) = inner.agents.get_mut(&assignment.provider_agent_id) {
            provider.total_tasks += 1;
            provider.successful_tasks += 1;
            provider.last_seen = Utc::now();
        }

        info!(
            assignment_id = %assignment_id,
            signature = %tx_signature,
            "delivery recorded"
        );
        Ok(assignment)
    }

    async fn rate(&self, rated_agent_id: &AgentId, request: RateRequest) -> Result<Rating> {
        if !(1.0..=5.0).contains(&request.stars) {
            return Err(AgoraError::validation("stars must be within [1, 5]"));
        }

        let mut inner = self.inner.write().await;

        let assignment = inner
            .assignments
            .get(&request.assignment_id)
            .ok_or_else(|| AgoraError::not_found("assignment", request.assignment_id.to_string()))?
            .clone();
        if assignment.consumer_agent_id != request.rater_agent_id {
            return Err(AgoraError::unauthorized(
                "only the assignment's consumer may rate it",
            ));
        }
        if &assignment.provider_agent_id != rated_agent_id {
            return Err(AgoraError::validation(format!(
                "agent {} is not the provider on assignment {}",
                rated_agent_id, request.assignment_id
            )));
        }
        let dedup_key = (request.rater_agent_id.clone(), request.assignment_id);
        if inner.rated_assignments.contains(&dedup_key) {
            return Err(AgoraError::conflict(format!(
                "assignment {} has already been rated by {}",
                request.assignment_id, request.rater_agent_id
            )));
        }
        if !inner.agents.contains_key(rated_agent_id) {
            return Err(AgoraError::not_found("agent", rated_agent_id.as_str()));
        }

        let rating = Rating {
            rating_id: RatingId::new(),
            assignment_id: request.assignment_id,
            rater_agent_id: request.rater_agent_id,
            rated_agent_id: rated_agent_id.clone(),
            stars: request.stars,
            review_text: request.review_text,
            data_quality: request.data_quality.clamp(1.0, 5.0),
            response_time: request.response_time.clamp(1.0, 5.0),
            value_for_price: request.value_for_price.clamp(1.0, 5.0),
            created_at: Utc::now(),
        };

        inner.rated_assignments.insert(dedup_key);
        let history = inner.ratings.entry(rated_agent_id.clone()).or_default();
        history.push(rating.clone());
        let mean = history.iter().map(|r| r.stars).sum::<f64>() / history.len() as f64;
        let count = history.len() as u64;

        if let Some(agent) = inner.agents.get_mut(rated_agent_id) {
            agent.reputation = mean;
            agent.rating_count = count;
        }
        if let Some(assignment) = inner.assignments.get_mut(&rating.assignment_id) {
            assignment.status = AssignmentStatus::Completed;
        }

        info!(
            rated = %rated_agent_id,
            stars = rating.stars,
            reputation = mean,
            "rating recorded"
        );
        Ok(rating)
    }

    async fn reputation(&self, agent_id: &AgentId) -> Result<ReputationSummary> {
        let inner = self.inner.read().await;
        let agent = inner
            .agents
            .get(agent_id)
            .ok_or_else(|| AgoraError::not_found("agent", agent_id.as_str()))?;

        let mut summary = ReputationSummary::empty(agent_id.clone());
        if let Some(history) = inner.ratings.get(agent_id) {
            summary.count = history.len() as u64;
            for rating in history {
                summary.histogram[star_bucket(rating.stars)] += 1;
            }
        }
        summary.mean = agent.reputation;
        Ok(summary)
    }

    async fn list_ratings(&self, agent_id: &AgentId, limit: usize) -> Result<Vec<Rating>> {
        let inner = self.inner.read().await;
        if !inner.agents.contains_key(agent_id) {
            return Err(AgoraError::not_found("agent", agent_id.as_str()));
        }
        let mut ratings = inner.ratings.get(agent_id).cloned().unwrap_or_default();
        ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        ratings.truncate(limit);
        Ok(ratings)
    }

    async fn stats(&self) -> Result<RegistryStats> {
        let inner = self.inner.read().await;
        Ok(RegistryStats {
            total_agents: inner.agents.len(),
            total_rfps: inner.rfps.len(),
            open_rfps: inner
                .rfps
                .values()
                .filter(|r| r.status == RfpStatus::Open)
                .count(),
            total_bids: inner.bids.values().map(Vec::len).sum(),
            total_assignments: inner.assignments.len(),
            total_ratings: inner.ratings.values().map(Vec::len).sum(),
        })
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for rfp in inner.rfps.values_mut() {
            if now >= rfp.expires_at && rfp.status.can_transition_to(RfpStatus::Expired) {
                debug!(rfp_id = %rfp.rfp_id, "RFP expired");
                rfp.status = RfpStatus::Expired;
                changed += 1;
            } else if rfp.status == RfpStatus::Open {
                if let Some(deadline) = rfp.bidding_deadline {
                    if now > deadline {
                        rfp.status = RfpStatus::BiddingClosed;
                        changed += 1;
                    }
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_types::{AgentType, UsdcAmount};
    use std::collections::HashMap as Map;
    use std::sync::Arc;

    fn registration(id: &str, wallet: &str, price: u64) -> AgentRegistration {
        let mut pricing = Map::new();
        pricing.insert("price_data".to_string(), UsdcAmount(price));
        AgentRegistration {
            agent_id: AgentId::new(id),
            name: format!("Provider {id}"),
            agent_type: AgentType::DataProvider,
            endpoint_url: format!("http://localhost:5000/{id}"),
            wallet_address: wallet.to_string(),
            capabilities: vec!["price_data".to_string()],
            pricing,
            reputation: None,
        }
    }

    fn rfp_request(budget: u64) -> CreateRfp {
        CreateRfp {
            requester_agent_id: AgentId::new("consumer_001"),
            task_type: "price_data".to_string(),
            requirements: Map::new(),
            max_budget_usdc: UsdcAmount(budget),
            required_delivery_time_ms: Some(1000),
            expires_in_seconds: 300,
            bidding_window_seconds: Some(10),
        }
    }

    fn bid_request(bidder: &str, price: u64) -> SubmitBid {
        SubmitBid {
            bidder_agent_id: AgentId::new(bidder),
            bid_price_usdc: UsdcAmount(price),
            estimated_completion_ms: Some(500),
            confidence_score: 0.9,
            message: "fast and accurate".to_string(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_register_is_idempotent_per_agent_id() {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let updated = store.register_agent(registration("p1", "W2", 150)).await.unwrap();

        assert_eq!(updated.wallet_address, "W2");
        let filter = AgentFilter::default();
        assert_eq!(store.list_agents(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reputation_seed_only_before_first_rating() {
        let store = InMemoryStore::new();
        let mut reg = registration("p1", "W1", 100);
        reg.reputation = Some(4.8);
        let agent = store.register_agent(reg).await.unwrap();
        assert_eq!(agent.reputation, 4.8);
    }

    #[tokio::test]
    async fn test_list_agents_filters() {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let mut other = registration("x1", "W3", 10);
        other.agent_type = AgentType::Analytics;
        other.capabilities = vec!["analytics".to_string()];
        store.register_agent(other).await.unwrap();

        let filter = AgentFilter {
            agent_type: Some(AgentType::DataProvider),
            ..Default::default()
        };
        let agents = store.list_agents(&filter).await.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].agent_id.as_str(), "p1");

        let filter = AgentFilter {
            capability: Some("analytics".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list_agents(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_requires_registration() {
        let store = InMemoryStore::new();
        let err = store
            .subscribe(&AgentId::new("ghost"), "price_data")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_bid_over_budget_is_rejected_and_rfp_stays_open() {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let rfp = store.create_rfp(rfp_request(50)).await.unwrap();

        let err = store
            .submit_bid(&rfp.rfp_id, bid_request("p1", 100))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let rfp = store.get_rfp(&rfp.rfp_id).await.unwrap();
        assert_eq!(rfp.status, RfpStatus::Open);
        assert!(store.list_bids(&rfp.rfp_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rebid_replaces_prior_bid() {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let rfp = store.create_rfp(rfp_request(200)).await.unwrap();

        store.submit_bid(&rfp.rfp_id, bid_request("p1", 150)).await.unwrap();
        store.submit_bid(&rfp.rfp_id, bid_request("p1", 120)).await.unwrap();

        let bids = store.list_bids(&rfp.rfp_id).await.unwrap();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].bid_price_usdc, UsdcAmount(120));
    }

    #[tokio::test]
    async fn test_bid_snapshot_takes_registry_reputation() {
        let store = InMemoryStore::new();
        let mut reg = registration("p1", "W1", 100);
        reg.reputation = Some(4.8);
        store.register_agent(reg).await.unwrap();
        let rfp = store.create_rfp(rfp_request(200)).await.unwrap();

        let bid = store.submit_bid(&rfp.rfp_id, bid_request("p1", 150)).await.unwrap();
        assert_eq!(bid.reputation_score, 4.8);
    }

    #[tokio::test]
    async fn test_winner_selection_is_exclusive_under_concurrency() {
        let store = Arc::new(InMemoryStore::new());
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        store.register_agent(registration("p2", "W2", 100)).await.unwrap();
        let rfp = store.create_rfp(rfp_request(200)).await.unwrap();
        let b1 = store.submit_bid(&rfp.rfp_id, bid_request("p1", 150)).await.unwrap();
        let b2 = store.submit_bid(&rfp.rfp_id, bid_request("p2", 120)).await.unwrap();

        let consumer = AgentId::new("consumer_001");
        let s1 = {
            let store = store.clone();
            let consumer = consumer.clone();
            let rfp_id = rfp.rfp_id;
            tokio::spawn(async move { store.select_winner(&rfp_id, &b1.bid_id, &consumer).await })
        };
        let s2 = {
            let store = store.clone();
            let consumer = consumer.clone();
            let rfp_id = rfp.rfp_id;
            tokio::spawn(async move { store.select_winner(&rfp_id, &b2.bid_id, &consumer).await })
        };

        let results = [s1.await.unwrap(), s2.await.unwrap()];
        let won = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(won, 1);
        let conflict = results.iter().find(|r| r.is_err()).unwrap();
        assert_eq!(
            conflict.as_ref().unwrap_err().error_code(),
            "CONFLICT"
        );
        assert_eq!(
            store.get_rfp(&rfp.rfp_id).await.unwrap().status,
            RfpStatus::Assigned
        );
    }

    #[tokio::test]
    async fn test_select_requires_requester() {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let rfp = store.create_rfp(rfp_request(200)).await.unwrap();
        let bid = store.submit_bid(&rfp.rfp_id, bid_request("p1", 150)).await.unwrap();

        let err = store
            .select_winner(&rfp.rfp_id, &bid.bid_id, &AgentId::new("intruder"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_assignment_price_matches_winning_bid() {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let rfp = store.create_rfp(rfp_request(200)).await.unwrap();
        let bid = store.submit_bid(&rfp.rfp_id, bid_request("p1", 150)).await.unwrap();

        let assignment = store
            .select_winner(&rfp.rfp_id, &bid.bid_id, &AgentId::new("consumer_001"))
            .await
            .unwrap();
        assert_eq!(assignment.agreed_price_usdc, bid.bid_price_usdc);
        assert_eq!(assignment.status, AssignmentStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_record_delivery_is_idempotent_per_signature() {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let rfp = store.create_rfp(rfp_request(200)).await.unwrap();
        let bid = store.submit_bid(&rfp.rfp_id, bid_request("p1", 150)).await.unwrap();
        let assignment = store
            .select_winner(&rfp.rfp_id, &bid.bid_id, &AgentId::new("consumer_001"))
            .await
            .unwrap();

        store
            .record_delivery(&assignment.assignment_id, "5sig")
            .await
            .unwrap();
        let again = store
            .record_delivery(&assignment.assignment_id, "5sig")
            .await
            .unwrap();
        assert_eq!(again.payment_tx_signature.as_deref(), Some("5sig"));

        let provider = store.get_agent(&AgentId::new("p1")).await.unwrap();
        assert_eq!(provider.total_tasks, 1);
        assert_eq!(provider.successful_tasks, 1);

        let err = store
            .record_delivery(&assignment.assignment_id, "other_sig")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
    }

    async fn assigned_store() -> (InMemoryStore, Assignment) {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let rfp = store.create_rfp(rfp_request(200)).await.unwrap();
        let bid = store.submit_bid(&rfp.rfp_id, bid_request("p1", 150)).await.unwrap();
        let assignment = store
            .select_winner(&rfp.rfp_id, &bid.bid_id, &AgentId::new("consumer_001"))
            .await
            .unwrap();
        (store, assignment)
    }

    fn rate_request(assignment: &Assignment, stars: f64) -> RateRequest {
        RateRequest {
            rater_agent_id: assignment.consumer_agent_id.clone(),
            assignment_id: assignment.assignment_id,
            stars,
            review_text: "solid".to_string(),
            data_quality: 5.0,
            response_time: 4.0,
            value_for_price: 4.0,
        }
    }

    #[tokio::test]
    async fn test_reputation_is_running_mean_of_stars() {
        let (store, assignment) = assigned_store().await;
        let p1 = AgentId::new("p1");
        store.rate(&p1, rate_request(&assignment, 5.0)).await.unwrap();

        let agent = store.get_agent(&p1).await.unwrap();
        assert!((agent.reputation - 5.0).abs() < 1e-9);
        assert_eq!(agent.rating_count, 1);

        let summary = store.reputation(&p1).await.unwrap();
        assert!((summary.mean - 5.0).abs() < 1e-9);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.histogram, [0, 0, 0, 0, 1]);
    }

    #[tokio::test]
    async fn test_duplicate_rating_conflicts() {
        let (store, assignment) = assigned_store().await;
        let p1 = AgentId::new("p1");
        store.rate(&p1, rate_request(&assignment, 4.0)).await.unwrap();
        let err = store
            .rate(&p1, rate_request(&assignment, 2.0))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[tokio::test]
    async fn test_only_consumer_may_rate() {
        let (store, assignment) = assigned_store().await;
        let p1 = AgentId::new("p1");
        let mut req = rate_request(&assignment, 4.0);
        req.rater_agent_id = AgentId::new("intruder");
        let err = store.rate(&p1, req).await.unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_expired_rfp_is_hidden_and_rejects_bids() {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let mut request = rfp_request(200);
        request.expires_in_seconds = 1;
        request.bidding_window_seconds = None;
        let rfp = store.create_rfp(request).await.unwrap();

        let later = Utc::now() + Duration::seconds(2);
        let changed = store.expire_stale(later).await.unwrap();
        assert_eq!(changed, 1);

        assert_eq!(
            store.get_rfp(&rfp.rfp_id).await.unwrap().status,
            RfpStatus::Expired
        );
        assert!(store.list_open_rfps(&[]).await.unwrap().is_empty());

        let err = store
            .submit_bid(&rfp.rfp_id, bid_request("p1", 100))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[tokio::test]
    async fn test_sweeper_closes_bidding_after_deadline() {
        let store = InMemoryStore::new();
        let mut request = rfp_request(200);
        request.bidding_window_seconds = Some(1);
        let rfp = store.create_rfp(request).await.unwrap();

        let later = Utc::now() + Duration::seconds(2);
        store.expire_stale(later).await.unwrap();
        assert_eq!(
            store.get_rfp(&rfp.rfp_id).await.unwrap().status,
            RfpStatus::BiddingClosed
        );
    }

    #[tokio::test]
    async fn test_cancel_requires_requester_and_open_state() {
        let store = InMemoryStore::new();
        let rfp = store.create_rfp(rfp_request(200)).await.unwrap();

        let err = store
            .cancel_rfp(&rfp.rfp_id, &AgentId::new("intruder"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");

        let cancelled = store
            .cancel_rfp(&rfp.rfp_id, &AgentId::new("consumer_001"))
            .await
            .unwrap();
        assert_eq!(cancelled.status, RfpStatus::Cancelled);

        let err = store
            .cancel_rfp(&rfp.rfp_id, &AgentId::new("consumer_001"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemoryStore::new();
        store.register_agent(registration("p1", "W1", 100)).await.unwrap();
        let rfp = store.create_rfp(rfp_request(200)).await.unwrap();
        store.submit_bid(&rfp.rfp_id, bid_request("p1", 150)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_agents, 1);
        assert_eq!(stats.total_rfps, 1);
        assert_eq!(stats.open_rfps, 1);
        assert_eq!(stats.total_bids, 1);
    }
}
