//! x402 flow tests against in-process stub services
//!
//! A stub ledger, facilitator and provider run on ephemeral ports so the
//! full challenge -> settle -> retry path is exercised over real HTTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use agora_payments::{
    LedgerRpcClient, TokenTransferBuilder, TransferEnvelope, X402Client, X402Config,
};
use agora_types::UsdcAmount;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

const MINT: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";
const NETWORK: &str = "solana-devnet";
const PROVIDER_WALLET: &str = "W_provider";
const CONSUMER_WALLET: &str = "W_consumer";

/// How the stub provider behaves on a paid retry
#[derive(Clone, Copy, PartialEq)]
enum ProviderMode {
    Deliver,
    RejectProof,
    CrashAfterPayment,
    Free,
}

struct TestEnv {
    ledger_transactions: Arc<Mutex<HashMap<String, Value>>>,
    settle_calls: Arc<AtomicU32>,
    provider_challenges: Arc<AtomicU32>,
    provider_url: String,
    ledger_url: String,
}

struct FacilitatorStub {
    transactions: Arc<Mutex<HashMap<String, Value>>>,
    settle_calls: Arc<AtomicU32>,
    fail_settle: bool,
    /// First settle call broadcasts the transfer but answers with a
    /// garbled body, simulating a response lost in transit
    drop_first_settle_response: bool,
    /// Settlements keyed by blockhash + nonce; a resubmitted envelope
    /// gets its original signature back instead of a second broadcast
    settled_by_nonce: Mutex<HashMap<String, String>>,
}

async fn facilitator_settle(
    State(stub): State<Arc<FacilitatorStub>>,
    Json(body): Json<Value>,
) -> Response {
    let call = stub.settle_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if stub.fail_settle {
        return Json(json!({"success": false, "error": "insufficient_balance"})).into_response();
    }
    let encoded = body["payment"]["transaction"].as_str().unwrap_or_default();
    let envelope = match TransferEnvelope::decode(encoded) {
        Ok(envelope) => envelope,
        Err(_) => {
            return Json(json!({"success": false, "error": "malformed transaction"}))
                .into_response()
        }
    };

    let dedup_key = format!("{}:{}", envelope.blockhash, envelope.nonce);
    let signature = {
        let mut settled = stub.settled_by_nonce.lock().unwrap();
        match settled.get(&dedup_key) {
            Some(signature) => signature.clone(),
            None => {
                let signature = format!("sig_{}", Uuid::new_v4().simple());
                stub.transactions.lock().unwrap().insert(
                    signature.clone(),
                    json!({
                        "finalized": true,
                        "transfer": {
                            "recipient": envelope.recipient,
                            "tokenMint": envelope.token_mint,
                            "amountMinor": envelope.amount_minor,
                        },
                    }),
                );
                settled.insert(dedup_key, signature.clone());
                signature
            }
        }
    };

    if stub.drop_first_settle_response && call == 1 {
        // The transfer is already on the ledger; the client never learns.
        return (StatusCode::OK, "garbled").into_response();
    }

    Json(json!({
        "success": true,
        "transactionSignature": signature,
        "network": envelope.network,
    }))
    .into_response()
}

async fn ledger_rpc(
    State(transactions): State<Arc<Mutex<HashMap<String, Value>>>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let result = match request["method"].as_str().unwrap_or_default() {
        "getLatestBlockhash" => {
            json!({"value": {"blockhash": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"}})
        }
        "getTransaction" => {
            let signature = request["params"][0].as_str().unwrap_or_default();
            transactions
                .lock()
                .unwrap()
                .get(signature)
                .cloned()
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    };
    Json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
}

struct ProviderStub {
    mode: ProviderMode,
    price_minor: u64,
    facilitator_url: String,
    challenges: Arc<AtomicU32>,
    transactions: Arc<Mutex<HashMap<String, Value>>>,
}

async fn provider_deliver(
    State(stub): State<Arc<ProviderStub>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if stub.mode == ProviderMode::Free {
        return (StatusCode::OK, Json(json!({"service_data": {"free": true}})));
    }

    let proof = headers
        .get("X-Payment-Response")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| serde_json::from_str::<Value>(v).ok());

    let Some(proof) = proof else {
        stub.challenges.fetch_add(1, Ordering::SeqCst);
        return (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "recipient": PROVIDER_WALLET,
                "amount_human": UsdcAmount(stub.price_minor).to_human_string(),
                "amount_minor": stub.price_minor,
                "token_mint": MINT,
                "network": NETWORK,
                "facilitator_url": stub.facilitator_url,
                "nonce": Uuid::new_v4(),
                "expires_at": Utc::now() + Duration::seconds(120),
            })),
        );
    };

    match stub.mode {
        ProviderMode::RejectProof => (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({"error": "payment_not_found_or_insufficient"})),
        ),
        ProviderMode::CrashAfterPayment => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "handler exploded"})),
        ),
        _ => {
            let signature = proof["signature"].as_str().unwrap_or_default();
            let confirmed = stub
                .transactions
                .lock()
                .unwrap()
                .contains_key(signature);
            if !confirmed {
                return (
                    StatusCode::PAYMENT_REQUIRED,
                    Json(json!({"error": "payment_not_found_or_insufficient"})),
                );
            }
            (
                StatusCode::OK,
                Json(json!({
                    "service_data": {"symbol": "SOL/USDC", "price": 142.35},
                    "payment_signature": signature,
                })),
            )
        }
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn build_env(
    mode: ProviderMode,
    price_minor: u64,
    fail_settle: bool,
    drop_first_settle_response: bool,
) -> TestEnv {
    let transactions: Arc<Mutex<HashMap<String, Value>>> = Arc::new(Mutex::new(HashMap::new()));
    let settle_calls = Arc::new(AtomicU32::new(0));
    let challenges = Arc::new(AtomicU32::new(0));

    let ledger_url = serve(
        Router::new()
            .route("/", post(ledger_rpc))
            .with_state(transactions.clone()),
    )
    .await;

    let facilitator_url = serve(
        Router::new()
            .route("/settle", post(facilitator_settle))
            .with_state(Arc::new(FacilitatorStub {
                transactions: transactions.clone(),
                settle_calls: settle_calls.clone(),
                fail_settle,
                drop_first_settle_response,
                settled_by_nonce: Mutex::new(HashMap::new()),
            })),
    )
    .await;

    let provider_url = serve(
        Router::new()
            .route("/deliver", post(provider_deliver))
            .with_state(Arc::new(ProviderStub {
                mode,
                price_minor,
                facilitator_url: facilitator_url.clone(),
                challenges: challenges.clone(),
                transactions: transactions.clone(),
            })),
    )
    .await;

    TestEnv {
        ledger_transactions: transactions,
        settle_calls,
        provider_challenges: challenges,
        provider_url,
        ledger_url,
    }
}

fn client_for(env: &TestEnv) -> X402Client {
    let builder = TokenTransferBuilder::new(LedgerRpcClient::new(env.ledger_url.clone()));
    X402Client::new(
        Arc::new(builder),
        X402Config {
            wallet_address: CONSUMER_WALLET.to_string(),
            network: NETWORK.to_string(),
        },
    )
}

#[tokio::test]
async fn test_happy_path_settles_exactly_once_for_exact_amount() {
    let env = build_env(ProviderMode::Deliver, 100, false, false).await;
    let client = client_for(&env);

    let response = client
        .post(
            &format!("{}/deliver", env.provider_url),
            &json!({"task_type": "price_data"}),
            UsdcAmount(200),
        )
        .await
        .unwrap();

    let signature = response.signature.expect("payment should have settled");
    assert_eq!(env.settle_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        response.data["service_data"]["symbol"].as_str(),
        Some("SOL/USDC")
    );

    // Exactly one ledger transaction, for exactly the advertised price,
    // to the provider's wallet.
    let transactions = env.ledger_transactions.lock().unwrap();
    assert_eq!(transactions.len(), 1);
    let record = transactions.get(&signature).unwrap();
    assert_eq!(record["transfer"]["amountMinor"].as_u64(), Some(100));
    assert_eq!(
        record["transfer"]["recipient"].as_str(),
        Some(PROVIDER_WALLET)
    );
}

#[tokio::test]
async fn test_challenge_over_ceiling_is_rejected_without_settlement() {
    let env = build_env(ProviderMode::Deliver, 300, false, false).await;
    let client = client_for(&env);

    let err = client
        .post(
            &format!("{}/deliver", env.provider_url),
            &json!({}),
            UsdcAmount(200),
        )
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "BUDGET_EXCEEDED");
    assert_eq!(env.settle_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_settlement_failure_is_terminal_with_single_402() {
    let env = build_env(ProviderMode::Deliver, 100, true, false).await;
    let client = client_for(&env);

    let err = client
        .post(
            &format!("{}/deliver", env.provider_url),
            &json!({}),
            UsdcAmount(200),
        )
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "SETTLEMENT_FAILED");
    assert!(err.settled_signature().is_none());
    // The provider saw exactly one unpaid request and no paid retry.
    assert_eq!(env.provider_challenges.load(Ordering::SeqCst), 1);
    assert_eq!(env.settle_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_402_after_proof_is_payment_rejected() {
    let env = build_env(ProviderMode::RejectProof, 100, false, false).await;
    let client = client_for(&env);

    let err = client
        .post(
            &format!("{}/deliver", env.provider_url),
            &json!({}),
            UsdcAmount(200),
        )
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "PAYMENT_REJECTED");
    // The settlement happened, so the signature must survive the failure.
    assert!(err.settled_signature().is_some());
    assert_eq!(env.settle_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_5xx_after_payment_keeps_signature() {
    let env = build_env(ProviderMode::CrashAfterPayment, 100, false, false).await;
    let client = client_for(&env);

    let err = client
        .post(
            &format!("{}/deliver", env.provider_url),
            &json!({}),
            UsdcAmount(200),
        )
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "DELIVERY_FAILED_AFTER_PAYMENT");
    let signature = err.settled_signature().unwrap();
    assert!(env
        .ledger_transactions
        .lock()
        .unwrap()
        .contains_key(signature));
}

#[tokio::test]
async fn test_settle_transport_glitch_does_not_double_pay() {
    // The facilitator broadcasts the transfer but its response is lost in
    // transit. The client must resubmit the same envelope, and the
    // blockhash + nonce dedup must hand back the original signature
    // instead of moving money a second time.
    let env = build_env(ProviderMode::Deliver, 100, false, true).await;
    let client = client_for(&env);

    let response = client
        .post(
            &format!("{}/deliver", env.provider_url),
            &json!({}),
            UsdcAmount(200),
        )
        .await
        .unwrap();

    assert_eq!(env.settle_calls.load(Ordering::SeqCst), 2);
    let signature = response.signature.expect("payment should have settled");
    let transactions = env.ledger_transactions.lock().unwrap();
    assert_eq!(
        transactions.len(),
        1,
        "the resubmission must not create a second transfer"
    );
    let record = transactions.get(&signature).unwrap();
    assert_eq!(record["transfer"]["amountMinor"].as_u64(), Some(100));
    assert_eq!(
        record["transfer"]["recipient"].as_str(),
        Some(PROVIDER_WALLET)
    );
}

#[tokio::test]
async fn test_free_endpoint_needs_no_payment() {
    let env = build_env(ProviderMode::Free, 100, false, false).await;
    let client = client_for(&env);

    let response = client
        .post(
            &format!("{}/deliver", env.provider_url),
            &json!({}),
            UsdcAmount(200),
        )
        .await
        .unwrap();

    assert!(response.signature.is_none());
    assert_eq!(env.settle_calls.load(Ordering::SeqCst), 0);
}
