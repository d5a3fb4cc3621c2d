//! Provider `/deliver` endpoint tests
//!
//! The provider router is driven with `oneshot` requests while a stub
//! ledger answers `getTransaction` lookups, covering the challenge shape,
//! proof verification and replay resistance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agora_provider::{BasePricePolicy, PriceFeedHandler, ProviderAgent, ProviderConfig};
use agora_types::UsdcAmount;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

const WALLET: &str = "W_provider";
const MINT: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";

type LedgerMap = Arc<Mutex<HashMap<String, Value>>>;

async fn ledger_rpc(
    State(transactions): State<LedgerMap>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let result = match request["method"].as_str().unwrap_or_default() {
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

async fn spawn_ledger(transactions: LedgerMap) -> String {
    let app = Router::new()
        .route("/", post(ledger_rpc))
        .with_state(transactions);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn finalized_transfer(recipient: &str, mint: &str, amount_minor: u64) -> Value {
    json!({
        "finalized": true,
        "transfer": {
            "recipient": recipient,
            "tokenMint": mint,
            "amountMinor": amount_minor,
        },
    })
}

async fn test_provider(transactions: LedgerMap) -> Arc<ProviderAgent> {
    let ledger_url = spawn_ledger(transactions).await;
    let mut config = ProviderConfig::new("p1", "Test Provider", WALLET)
        .with_capability("price_data", UsdcAmount(100));
    config.ledger_rpc_url = ledger_url;
    config.token_mint = MINT.to_string();
    config.replay_ttl = Duration::from_secs(60);
    Arc::new(ProviderAgent::new(
        config,
        Arc::new(BasePricePolicy::default()),
        Arc::new(PriceFeedHandler::default()),
    ))
}

async fn deliver_request(
    router: &Router,
    proof: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/deliver")
        .header("Content-Type", "application/json");
    if let Some(proof) = proof {
        request = request.header("X-Payment-Response", proof);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(json!(null));
    (status, json)
}

fn proof_header(signature: &str) -> String {
    json!({"signature": signature, "network": "solana-devnet"}).to_string()
}

#[tokio::test]
async fn test_missing_proof_gets_402_challenge() {
    let transactions: LedgerMap = Arc::new(Mutex::new(HashMap::new()));
    let provider = test_provider(transactions).await;
    let router = provider.router();

    let (status, challenge) =
        deliver_request(&router, None, json!({"task_type": "price_data"})).await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(challenge["recipient"], WALLET);
    assert_eq!(challenge["amount_minor"], 100);
    assert_eq!(challenge["amount_human"], "0.0001");
    assert_eq!(challenge["token_mint"], MINT);
    assert!(challenge["facilitator_url"].as_str().is_some());
    assert!(challenge["nonce"].as_str().is_some());
    assert!(challenge["expires_at"].as_str().is_some());
}

#[tokio::test]
async fn test_valid_proof_serves_data_once() {
    let transactions: LedgerMap = Arc::new(Mutex::new(HashMap::new()));
    transactions
        .lock()
        .unwrap()
        .insert("sig_ok".to_string(), finalized_transfer(WALLET, MINT, 100));
    let provider = test_provider(transactions).await;
    let router = provider.router();

    let (status, body) = deliver_request(
        &router,
        Some(&proof_header("sig_ok")),
        json!({"task_type": "price_data", "symbol": "SOL/USDC"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_signature"], "sig_ok");
    assert_eq!(body["service_data"]["symbol"], "SOL/USDC");

    // Same signature again within the replay window: rejected
    let (status, body) = deliver_request(
        &router,
        Some(&proof_header("sig_ok")),
        json!({"task_type": "price_data"}),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "payment_replayed");
}

#[tokio::test]
async fn test_underpaid_transfer_is_rejected() {
    let transactions: LedgerMap = Arc::new(Mutex::new(HashMap::new()));
    transactions
        .lock()
        .unwrap()
        .insert("sig_low".to_string(), finalized_transfer(WALLET, MINT, 40));
    let provider = test_provider(transactions).await;
    let router = provider.router();

    let (status, body) = deliver_request(
        &router,
        Some(&proof_header("sig_low")),
        json!({"task_type": "price_data"}),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "payment_not_found_or_insufficient");
}

#[tokio::test]
async fn test_transfer_to_wrong_wallet_is_rejected() {
    let transactions: LedgerMap = Arc::new(Mutex::new(HashMap::new()));
    transactions.lock().unwrap().insert(
        "sig_misdirected".to_string(),
        finalized_transfer("W_other", MINT, 100),
    );
    let provider = test_provider(transactions).await;
    let router = provider.router();

    let (status, _) = deliver_request(
        &router,
        Some(&proof_header("sig_misdirected")),
        json!({"task_type": "price_data"}),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_unknown_signature_is_rejected() {
    let transactions: LedgerMap = Arc::new(Mutex::new(HashMap::new()));
    let provider = test_provider(transactions).await;
    let router = provider.router();

    let (status, body) = deliver_request(
        &router,
        Some(&proof_header("sig_ghost")),
        json!({"task_type": "price_data"}),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "payment_not_found_or_insufficient");
}

#[tokio::test]
async fn test_unpriced_task_type_is_400() {
    let transactions: LedgerMap = Arc::new(Mutex::new(HashMap::new()));
    let provider = test_provider(transactions).await;
    let router = provider.router();

    let (status, _) =
        deliver_request(&router, None, json!({"task_type": "swap_execution"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_garbled_proof_is_402() {
    let transactions: LedgerMap = Arc::new(Mutex::new(HashMap::new()));
    let provider = test_provider(transactions).await;
    let router = provider.router();

    let (status, body) =
        deliver_request(&router, Some("not json"), json!({"task_type": "price_data"})).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "invalid_payment_proof");
}
