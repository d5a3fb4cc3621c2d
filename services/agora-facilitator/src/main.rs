//! Agora Facilitator
//!
//! The trusted settlement intermediary of the x402 flow. Consumers hand
//! it an unsigned transaction; it co-signs as fee payer and broadcasts to
//! the ledger, so payments are gasless from the consumer's side.
//!
//! Endpoints: `GET /supported`, `POST /verify`, `POST /settle`,
//! `GET /health`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agora_payments::{LedgerRpcClient, TransferEnvelope};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::RngCore;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct FacilitatorState {
    /// Fee-payer public key, derived from the signing seed
    fee_payer: String,
    /// Signing seed; stays in memory and is never logged
    signing_seed: Vec<u8>,
    network: String,
    token_mint: String,
    ledger: LedgerRpcClient,
    /// Settlement dedup cache keyed by blockhash + nonce. A client whose
    /// settle response was lost in transit resubmits the same envelope
    /// and gets the original signature back, not a second broadcast.
    settled: Mutex<HashMap<String, String>>,
}

impl FacilitatorState {
    fn from_env() -> Self {
        let signing_seed = match std::env::var("AGORA_FACILITATOR_PRIVATE_KEY") {
            Ok(encoded) => bs58::decode(encoded.trim())
                .into_vec()
                .unwrap_or_else(|_| encoded.into_bytes()),
            Err(_) => {
                warn!("AGORA_FACILITATOR_PRIVATE_KEY not set, using an ephemeral dev keypair");
                let mut seed = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut seed);
                seed
            }
        };
        let fee_payer = bs58::encode(Sha256::digest(&signing_seed)).into_string();
        Self {
            fee_payer,
            signing_seed,
            network: env_or("AGORA_NETWORK", "solana-devnet"),
            token_mint: env_or(
                "AGORA_TOKEN_MINT",
                "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
            ),
            ledger: LedgerRpcClient::new(env_or(
                "AGORA_LEDGER_RPC_URL",
                "https://api.devnet.solana.com",
            )),
            settled: Mutex::new(HashMap::new()),
        }
    }

    /// Deterministic fee-payer signature over the transaction bytes
    fn sign(&self, transaction_b64: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.signing_seed);
        hasher.update(transaction_b64.as_bytes());
        bs58::encode(hasher.finalize()).into_string()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

async fn root(State(state): State<Arc<FacilitatorState>>) -> Json<Value> {
    Json(json!({
        "service": "agora-facilitator",
        "facilitator": state.fee_payer,
        "network": state.network,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "agora-facilitator"}))
}

async fn supported(State(state): State<Arc<FacilitatorState>>) -> Json<Value> {
    Json(json!({
        "x402Version": 1,
        "scheme": "exact",
        "network": state.network,
        "feePayer": state.fee_payer,
        "supportedTokens": [state.token_mint],
    }))
}

/// Structural validation without broadcasting
async fn verify(
    State(state): State<Arc<FacilitatorState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let encoded = body["payment"]["transaction"].as_str().unwrap_or_default();
    let envelope = match TransferEnvelope::decode(encoded) {
        Ok(envelope) => envelope,
        Err(err) => {
            return Json(json!({"isValid": false, "message": err.to_string()}));
        }
    };

    if envelope.amount_minor == 0 {
        return Json(json!({"isValid": false, "message": "zero-amount transfer"}));
    }
    if envelope.recipient.is_empty() || envelope.recipient_token_account.is_empty() {
        return Json(json!({"isValid": false, "message": "missing recipient"}));
    }
    if envelope.network != state.network {
        return Json(json!({
            "isValid": false,
            "message": format!("network mismatch: expected {}", state.network),
        }));
    }
    Json(json!({"isValid": true, "message": "transaction verified"}))
}

/// Co-sign as fee payer and broadcast. Failures come back as
/// `{success: false, error}` with a 200 status; callers branch on the
/// body.
async fn settle(
    State(state): State<Arc<FacilitatorState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let encoded = body["payment"]["transaction"].as_str().unwrap_or_default();
    let envelope = match TransferEnvelope::decode(encoded) {
        Ok(envelope) => envelope,
        Err(err) => {
            return Json(json!({"success": false, "error": err.to_string()}));
        }
    };

    // Resubmission of an already-settled envelope returns the original
    // signature without touching the ledger again
    let dedup_key = format!("{}:{}", envelope.blockhash, envelope.nonce);
    let prior = state
        .settled
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(&dedup_key)
        .cloned();
    if let Some(signature) = prior {
        info!(signature = %signature, "duplicate settle, returning prior signature");
        return Json(json!({
            "success": true,
            "transactionSignature": signature,
            "network": envelope.network,
        }));
    }

    let signature = state.sign(encoded);
    match state.ledger.send_transaction(encoded, &signature).await {
        Ok(confirmed_signature) => {
            state
                .settled
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(dedup_key, confirmed_signature.clone());
            info!(
                signature = %confirmed_signature,
                amount_minor = envelope.amount_minor,
                recipient = %envelope.recipient,
                "payment settled"
            );
            Json(json!({
                "success": true,
                "transactionSignature": confirmed_signature,
                "network": envelope.network,
            }))
        }
        Err(err) => {
            warn!(error = %err, "broadcast failed");
            Json(json!({"success": false, "error": err.to_string()}))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = Arc::new(FacilitatorState::from_env());
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/supported", get(supported))
        .route("/verify", post(verify))
        .route("/settle", post(settle))
        .with_state(state.clone());

    let host = env_or("AGORA_FACILITATOR_HOST", "0.0.0.0");
    let port = env_or("AGORA_FACILITATOR_PORT", "3000");
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, fee_payer = %state.fee_payer, "agora facilitator listening");
    axum::serve(listener, app).await?;
    Ok(())
}
