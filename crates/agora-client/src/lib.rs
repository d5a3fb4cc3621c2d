//! Typed client for the agora registry API
//!
//! Providers use it to register, subscribe, poll and bid; consumers use it
//! to broadcast RFPs, collect bids, select winners and post ratings.
//! Non-2xx responses are decoded from the registry's `{code, message}`
//! error body back into [`AgoraError`] kinds.

use std::time::Duration;

use agora_types::{
    Agent, AgentFilter, AgentId, AgentListResponse, AgentRegistration, AgentStatus, AgoraError,
    Assignment, AssignmentId, Bid, CancelRfp, CreateRfp, RateRequest, Rating, RecordDelivery,
    ReputationSummary, Result, Rfp, RfpId, RfpListResponse, SelectWinner, SubmitBid,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client bound to one registry
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Client with a custom per-request timeout. Provider polling uses a
    /// short one so a slow registry does not stall the loop.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the registry answers its health endpoint
    pub async fn is_available(&self) -> bool {
        self.http
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    // ── Agents ──────────────────────────────────────────────────────

    pub async fn register_agent(&self, registration: &AgentRegistration) -> Result<Agent> {
        self.post_json("/agents/register", registration).await
    }

    pub async fn get_agent(&self, agent_id: &AgentId) -> Result<Agent> {
        self.get_json(&format!("/agents/{agent_id}")).await
    }

    pub async fn list_agents(&self, filter: &AgentFilter) -> Result<AgentListResponse> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(agent_type) = &filter.agent_type {
            query.push(("agent_type", enum_str(agent_type)));
        }
        if let Some(capability) = &filter.capability {
            query.push(("capability", capability.clone()));
        }
        if let Some(status) = &filter.status {
            query.push(("status", enum_str(status)));
        }

        let response = self
            .http
            .get(format!("{}/agents", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    pub async fn set_agent_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
    ) -> Result<Agent> {
        self.post_json(
            &format!("/agents/{agent_id}/status"),
            &json!({"status": status}),
        )
        .await
    }

    pub async fn subscribe(&self, agent_id: &AgentId, task_type: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_json(
                &format!("/agents/{agent_id}/subscribe"),
                &json!({"task_type": task_type}),
            )
            .await?;
        Ok(())
    }

    pub async fn rate_agent(&self, agent_id: &AgentId, request: &RateRequest) -> Result<Rating> {
        self.post_json(&format!("/agents/{agent_id}/rate"), request)
            .await
    }

    pub async fn reputation(&self, agent_id: &AgentId) -> Result<ReputationSummary> {
        self.get_json(&format!("/agents/{agent_id}/reputation"))
            .await
    }

    // ── RFPs ────────────────────────────────────────────────────────

    pub async fn create_rfp(&self, request: &CreateRfp) -> Result<Rfp> {
        self.post_json("/rfp/create", request).await
    }

    pub async fn get_rfp(&self, rfp_id: &RfpId) -> Result<Rfp> {
        self.get_json(&format!("/rfp/{}", rfp_id.as_uuid())).await
    }

    pub async fn open_rfps(&self, task_types: &[String]) -> Result<RfpListResponse> {
        let response = self
            .http
            .get(format!("{}/rfp/open", self.base_url))
            .query(&[("task_types", task_types.join(","))])
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    pub async fn submit_bid(&self, rfp_id: &RfpId, bid: &SubmitBid) -> Result<Bid> {
        self.post_json(&format!("/rfp/{}/bid", rfp_id.as_uuid()), bid)
            .await
    }

    pub async fn bids(&self, rfp_id: &RfpId) -> Result<Vec<Bid>> {
        self.get_json(&format!("/rfp/{}/bids", rfp_id.as_uuid()))
            .await
    }

    pub async fn select_winner(
        &self,
        rfp_id: &RfpId,
        request: &SelectWinner,
    ) -> Result<Assignment> {
        self.post_json(&format!("/rfp/{}/select", rfp_id.as_uuid()), request)
            .await
    }

    pub async fn cancel_rfp(&self, rfp_id: &RfpId, request: &CancelRfp) -> Result<Rfp> {
        self.post_json(&format!("/rfp/{}/cancel", rfp_id.as_uuid()), request)
            .await
    }

    // ── Assignments ─────────────────────────────────────────────────

    pub async fn record_delivery(
        &self,
        assignment_id: &AssignmentId,
        tx_signature: &str,
    ) -> Result<Assignment> {
        self.post_json(
            &format!("/assignments/{}/delivery", assignment_id.as_uuid()),
            &RecordDelivery {
                tx_signature: tx_signature.to_string(),
            },
        )
        .await
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }
}

fn transport_error(err: reqwest::Error) -> AgoraError {
    if err.is_timeout() {
        AgoraError::Timeout {
            operation: "registry request".to_string(),
            seconds: DEFAULT_TIMEOUT.as_secs(),
        }
    } else {
        AgoraError::upstream("registry", err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| AgoraError::upstream("registry", e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    if let Ok(wire) = serde_json::from_str::<serde_json::Value>(&body) {
        if let (Some(code), Some(message)) = (wire["code"].as_str(), wire["message"].as_str()) {
            return Err(AgoraError::from_wire(code, message));
        }
    }
    Err(AgoraError::upstream(
        "registry",
        format!("HTTP {status}: {body}"),
    ))
}

fn enum_str<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
