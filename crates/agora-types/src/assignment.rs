//! Task assignments created by winner selection

use crate::{AgentId, AssignmentId, BidId, RfpId, UsdcAmount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Assignment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    PendingPayment,
    PaymentConfirmed,
    Delivered,
    Disputed,
    Completed,
    Failed,
}

/// The durable record that a specific bid has been accepted.
///
/// `agreed_price_usdc` always equals the winning bid's price; at most one
/// assignment exists per RFP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: AssignmentId,
    pub rfp_id: RfpId,
    pub winning_bid_id: BidId,
    pub provider_agent_id: AgentId,
    pub consumer_agent_id: AgentId,
    pub agreed_price_usdc: UsdcAmount,
    pub status: AssignmentStatus,
    pub payment_tx_signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /rfp/{rfp_id}/select`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectWinner {
    pub bid_id: BidId,
    pub selector_agent_id: AgentId,
}

/// Request body for `POST /rfp/{rfp_id}/cancel`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRfp {
    pub requester_agent_id: AgentId,
}

/// Request body for `POST /assignments/{id}/delivery`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDelivery {
    pub tx_signature: String,
}
