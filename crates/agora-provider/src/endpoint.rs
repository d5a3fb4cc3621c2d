//! Provider HTTP service and payment verification

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agora_client::RegistryClient;
use agora_payments::LedgerRpcClient;
use agora_types::{
    AgentRegistration, AgentType, AgoraError, PaymentChallenge, PaymentProof, Result, RfpId,
    UsdcAmount, PAYMENT_RESPONSE_HEADER,
};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{BidPolicy, ProviderConfig, ReplayCache, ServiceHandler};

const REGISTRY_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// A long-running provider: registers itself, polls for RFPs, bids, and
/// serves payment-gated deliveries.
pub struct ProviderAgent {
    pub(crate) config: ProviderConfig,
    pub(crate) registry: RegistryClient,
    pub(crate) ledger: LedgerRpcClient,
    pub(crate) policy: Arc<dyn BidPolicy>,
    handler: Arc<dyn ServiceHandler>,
    replay: ReplayCache,
    pub(crate) seen_rfps: Mutex<HashSet<RfpId>>,
    pub(crate) bids_submitted: AtomicU64,
    deliveries_served: AtomicU64,
}

impl ProviderAgent {
    pub fn new(
        config: ProviderConfig,
        policy: Arc<dyn BidPolicy>,
        handler: Arc<dyn ServiceHandler>,
    ) -> Self {
        let registry =
            RegistryClient::with_timeout(config.registry_url.clone(), REGISTRY_POLL_TIMEOUT);
        let ledger = LedgerRpcClient::new(config.ledger_rpc_url.clone());
        let replay = ReplayCache::new(config.replay_ttl);
        Self {
            config,
            registry,
            ledger,
            policy,
            handler,
            replay,
            seen_rfps: Mutex::new(HashSet::new()),
            bids_submitted: AtomicU64::new(0),
            deliveries_served: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Register with the registry and subscribe to every capability.
    pub async fn register(&self) -> Result<()> {
        let registration = AgentRegistration {
            agent_id: self.config.agent_id.clone(),
            name: self.config.name.clone(),
            agent_type: AgentType::DataProvider,
            endpoint_url: self.config.endpoint_url.clone(),
            wallet_address: self.config.wallet_address.clone(),
            capabilities: self.config.capabilities.clone(),
            pricing: self.config.pricing.clone(),
            reputation: None,
        };
        self.registry.register_agent(&registration).await?;
        for capability in &self.config.capabilities {
            self.registry
                .subscribe(&self.config.agent_id, capability)
                .await?;
        }
        info!(
            agent_id = %self.config.agent_id,
            capabilities = ?self.config.capabilities,
            "provider registered"
        );
        Ok(())
    }

    /// The provider's HTTP router
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(root))
            .route("/health", get(health))
            .route("/deliver", post(deliver))
            .with_state(self)
    }

    fn challenge_for(&self, price: UsdcAmount) -> PaymentChallenge {
        PaymentChallenge {
            recipient: self.config.wallet_address.clone(),
            amount_human: price.to_human_string(),
            amount_minor: price.minor(),
            token_mint: self.config.token_mint.clone(),
            network: self.config.network.clone(),
            facilitator_url: self.config.facilitator_url.clone(),
            nonce: Uuid::new_v4(),
            expires_at: Utc::now()
                + chrono::Duration::seconds(self.config.challenge_ttl.as_secs() as i64),
        }
    }

    /// Verify a presented payment proof against the ledger: the
    /// transaction must exist, be finalized, and transfer at least the
    /// expected amount of the expected mint to our wallet.
    async fn verify_payment(&self, proof: &PaymentProof, expected: UsdcAmount) -> Result<()> {
        let confirmed = self
            .ledger
            .confirm_transfer(&proof.signature)
            .await?
            .ok_or_else(|| {
                AgoraError::PaymentRejected {
                    reason: "payment_not_found_or_insufficient".to_string(),
                    signature: Some(proof.signature.clone()),
                }
            })?;

        let acceptable = confirmed.finalized
            && confirmed.recipient == self.config.wallet_address
            && confirmed.token_mint == self.config.token_mint
            && confirmed.amount_minor >= expected.minor();
        if !acceptable {
            return Err(AgoraError::PaymentRejected {
                reason: "payment_not_found_or_insufficient".to_string(),
                signature: Some(proof.signature.clone()),
            });
        }
        Ok(())
    }
}

async fn root(State(agent): State<Arc<ProviderAgent>>) -> Json<Value> {
    Json(json!({
        "agent_id": agent.config.agent_id,
        "name": agent.config.name,
        "service": "agora-provider",
        "status": "active",
        "stats": {
            "bids_submitted": agent.bids_submitted.load(Ordering::Relaxed),
            "deliveries_served": agent.deliveries_served.load(Ordering::Relaxed),
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "agora-provider"}))
}

/// The x402-gated delivery endpoint.
async fn deliver(
    State(agent): State<Arc<ProviderAgent>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // The request body is optional JSON
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let task_type = request["task_type"]
        .as_str()
        .map(str::to_string)
        .or_else(|| agent.config.capabilities.first().cloned());

    let Some(task_type) = task_type else {
        return payment_error(
            StatusCode::BAD_REQUEST,
            "no task_type given and no capabilities configured",
        );
    };
    let Some(price) = agent.config.price_for(&task_type) else {
        return payment_error(
            StatusCode::BAD_REQUEST,
            &format!("task type '{task_type}' is not offered here"),
        );
    };

    let proof = headers
        .get(PAYMENT_RESPONSE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(PaymentProof::from_header_value);

    let proof = match proof {
        None => {
            // No proof presented: demand payment
            return (
                StatusCode::PAYMENT_REQUIRED,
                Json(agent.challenge_for(price)),
            )
                .into_response();
        }
        Some(None) => {
            return payment_error(StatusCode::PAYMENT_REQUIRED, "invalid_payment_proof");
        }
        Some(Some(proof)) => proof,
    };

    if let Err(err) = agent.verify_payment(&proof, price).await {
        return match err {
            AgoraError::PaymentRejected { reason, .. } => {
                warn!(signature = %proof.signature, "payment proof rejected");
                payment_error(StatusCode::PAYMENT_REQUIRED, &reason)
            }
            other => {
                warn!(error = %other, "ledger lookup failed during verification");
                payment_error(StatusCode::BAD_GATEWAY, "ledger_unavailable")
            }
        };
    }

    // Only consume the signature after it has proven valid
    if !agent.replay.try_accept(&proof.signature) {
        warn!(signature = %proof.signature, "replayed payment signature");
        return payment_error(StatusCode::PAYMENT_REQUIRED, "payment_replayed");
    }

    match agent.handler.handle(&task_type, &request).await {
        Ok(service_data) => {
            agent.deliveries_served.fetch_add(1, Ordering::Relaxed);
            info!(signature = %proof.signature, task_type = %task_type, "delivery served");
            (
                StatusCode::OK,
                Json(json!({
                    "service_data": service_data,
                    "payment_signature": proof.signature,
                    "agent_id": agent.config.agent_id,
                })),
            )
                .into_response()
        }
        Err(err) => {
            warn!(error = %err, "service handler failed after payment");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

fn payment_error(status: StatusCode, reason: &str) -> Response {
    (status, Json(json!({"error": reason}))).into_response()
}
