//! Ratings and reputation

use crate::{AgentId, AssignmentId, RatingId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only rating left by a consumer for a provider.
///
/// `stars` is the overall rating in [1, 5] and is the only input to the
/// provider's reputation mean. The per-dimension scores are informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub rating_id: RatingId,
    pub assignment_id: AssignmentId,
    pub rater_agent_id: AgentId,
    pub rated_agent_id: AgentId,
    pub stars: f64,
    pub review_text: String,
    pub data_quality: f64,
    pub response_time: f64,
    pub value_for_price: f64,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /agents/{id}/rate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRequest {
    pub rater_agent_id: AgentId,
    pub assignment_id: AssignmentId,
    pub stars: f64,
    #[serde(default)]
    pub review_text: String,
    #[serde(default = "default_dimension")]
    pub data_quality: f64,
    #[serde(default = "default_dimension")]
    pub response_time: f64,
    #[serde(default = "default_dimension")]
    pub value_for_price: f64,
}

fn default_dimension() -> f64 {
    3.0
}

/// Response body for `GET /agents/{id}/reputation`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationSummary {
    pub agent_id: AgentId,
    /// Arithmetic mean of all recorded star ratings, 0.0 when none exist
    pub mean: f64,
    pub count: u64,
    /// Counts of ratings rounded into the 1..=5 star buckets
    pub histogram: [u64; 5],
}

impl ReputationSummary {
    pub fn empty(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            mean: 0.0,
            count: 0,
            histogram: [0; 5],
        }
    }
}

/// Clamp a star value into the valid [1, 5] range bucket index
pub fn star_bucket(stars: f64) -> usize {
    (stars.round().clamp(1.0, 5.0) as usize) - 1
}
