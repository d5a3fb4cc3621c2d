//! Requests-for-proposal and bids

use crate::{AgentId, BidId, RfpId, UsdcAmount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// RFP lifecycle status.
///
/// Transitions are monotone along open -> bidding_closed -> assigned ->
/// completed; `cancelled` and `expired` are terminal sinks reachable from
/// `open` and `bidding_closed` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfpStatus {
    Open,
    BiddingClosed,
    Assigned,
    Completed,
    Cancelled,
    Expired,
}

impl RfpStatus {
    /// Whether this status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }

    /// Whether the transition `self -> next` is legal
    pub fn can_transition_to(&self, next: RfpStatus) -> bool {
        use RfpStatus::*;
        match (self, next) {
            (Open, BiddingClosed) | (Open, Assigned) => true,
            (BiddingClosed, Assigned) => true,
            (Assigned, Completed) => true,
            (Open, Cancelled) | (BiddingClosed, Cancelled) => true,
            (Open, Expired) | (BiddingClosed, Expired) => true,
            _ => false,
        }
    }
}

/// A request-for-proposal broadcast by a consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rfp {
    pub rfp_id: RfpId,
    pub requester_agent_id: AgentId,
    pub task_type: String,
    #[serde(default)]
    pub requirements: HashMap<String, serde_json::Value>,
    pub max_budget_usdc: UsdcAmount,
    pub required_delivery_time_ms: Option<u64>,
    /// Providers must stop bidding at this instant; the consumer's
    /// deterministic collection window ends here too.
    pub bidding_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: RfpStatus,
}

impl Rfp {
    /// Whether bids are currently acceptable for this RFP
    pub fn accepts_bids_at(&self, now: DateTime<Utc>) -> bool {
        self.status == RfpStatus::Open
            && now < self.expires_at
            && self.bidding_deadline.map_or(true, |d| now <= d)
    }
}

/// Request body for `POST /rfp/create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRfp {
    pub requester_agent_id: AgentId,
    pub task_type: String,
    #[serde(default)]
    pub requirements: HashMap<String, serde_json::Value>,
    pub max_budget_usdc: UsdcAmount,
    #[serde(default)]
    pub required_delivery_time_ms: Option<u64>,
    /// Seconds until the RFP expires outright
    #[serde(default = "default_expires_in")]
    pub expires_in_seconds: u64,
    /// Length of the bid-collection window, if the consumer wants one
    #[serde(default)]
    pub bidding_window_seconds: Option<u64>,
}

fn default_expires_in() -> u64 {
    300
}

/// A provider's offer against an RFP.
///
/// `reputation_score` is the registry's snapshot of the bidder's reputation
/// at submission time, not a bidder-supplied claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub bid_id: BidId,
    pub rfp_id: RfpId,
    pub bidder_agent_id: AgentId,
    pub bidder_name: String,
    pub bid_price_usdc: UsdcAmount,
    pub estimated_completion_ms: Option<u64>,
    pub confidence_score: f64,
    pub reputation_score: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /rfp/{rfp_id}/bid`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBid {
    pub bidder_agent_id: AgentId,
    pub bid_price_usdc: UsdcAmount,
    #[serde(default)]
    pub estimated_completion_ms: Option<u64>,
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_confidence() -> f64 {
    0.5
}

/// Response body for `GET /rfp/open`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfpListResponse {
    pub rfps: Vec<Rfp>,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_transitions() {
        use RfpStatus::*;
        assert!(Open.can_transition_to(Assigned));
        assert!(Open.can_transition_to(Expired));
        assert!(BiddingClosed.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(Completed));
        assert!(!Assigned.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Open));
        assert!(!Expired.can_transition_to(Assigned));
        assert!(Completed.is_terminal());
        assert!(!Open.is_terminal());
    }

    #[test]
    fn test_accepts_bids_respects_deadline() {
        let now = Utc::now();
        let rfp = Rfp {
            rfp_id: RfpId::new(),
            requester_agent_id: AgentId::new("c1"),
            task_type: "price_data".to_string(),
            requirements: HashMap::new(),
            max_budget_usdc: UsdcAmount(200),
            required_delivery_time_ms: None,
            bidding_deadline: Some(now - Duration::seconds(1)),
            created_at: now - Duration::seconds(10),
            expires_at: now + Duration::seconds(300),
            status: RfpStatus::Open,
        };
        assert!(!rfp.accepts_bids_at(now));

        let open = Rfp {
            bidding_deadline: Some(now + Duration::seconds(10)),
            ..rfp.clone()
        };
        assert!(open.accepts_bids_at(now));
    }
}
