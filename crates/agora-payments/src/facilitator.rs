//! Facilitator RPC client
//!
//! The facilitator is the trust boundary of the payment path: it co-signs
//! as fee payer and broadcasts, so the consumer never pays gas. Its three
//! operations are idempotent from the caller's side because settlement is
//! keyed by the transaction's blockhash + nonce.

use std::time::Duration;

use agora_types::{AgoraError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Response of `GET /supported`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedResponse {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    #[serde(rename = "feePayer")]
    pub fee_payer: String,
    #[serde(rename = "supportedTokens", default)]
    pub supported_tokens: Vec<String>,
}

/// Response of `POST /verify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `POST /settle`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleResponse {
    pub success: bool,
    #[serde(rename = "transactionSignature", default)]
    pub transaction_signature: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// HTTP client for one facilitator
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    base_url: String,
    http: reqwest::Client,
}

impl FacilitatorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_transport(operation: &str, timeout: Duration, err: reqwest::Error) -> AgoraError {
        if err.is_timeout() {
            AgoraError::Timeout {
                operation: format!("facilitator {operation}"),
                seconds: timeout.as_secs(),
            }
        } else {
            AgoraError::upstream("facilitator", err.to_string())
        }
    }

    /// Discover the facilitator's scheme, network and fee payer
    pub async fn supported(&self) -> Result<SupportedResponse> {
        let response = self
            .http
            .get(format!("{}/supported", self.base_url))
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await
            .map_err(|e| Self::map_transport("supported", VERIFY_TIMEOUT, e))?;
        response
            .json()
            .await
            .map_err(|e| AgoraError::upstream("facilitator", e.to_string()))
    }

    /// Structural validation without broadcasting
    pub async fn verify(&self, transaction_b64: &str) -> Result<VerifyResponse> {
        let response = self
            .http
            .post(format!("{}/verify", self.base_url))
            .timeout(VERIFY_TIMEOUT)
            .json(&json!({"payment": {"transaction": transaction_b64}}))
            .send()
            .await
            .map_err(|e| Self::map_transport("verify", VERIFY_TIMEOUT, e))?;
        response
            .json()
            .await
            .map_err(|e| AgoraError::upstream("facilitator", e.to_string()))
    }

    /// Sign as fee payer, broadcast, await confirmation.
    ///
    /// Transport failures are retriable; a `success: false` body is not,
    /// and surfaces as `SettlementFailed` at the call site.
    pub async fn settle(&self, transaction_b64: &str) -> Result<SettleResponse> {
        debug!(facilitator = %self.base_url, "settling payment");
        let response = self
            .http
            .post(format!("{}/settle", self.base_url))
            .timeout(SETTLE_TIMEOUT)
            .json(&json!({"payment": {"transaction": transaction_b64}}))
            .send()
            .await
            .map_err(|e| Self::map_transport("settle", SETTLE_TIMEOUT, e))?;
        response
            .json()
            .await
            .map_err(|e| AgoraError::upstream("facilitator", e.to_string()))
    }

    /// Liveness probe
    pub async fn health(&self) -> bool {
        self.http
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
