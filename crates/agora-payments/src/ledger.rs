//! JSON-RPC client for the ledger node

use std::time::Duration;

use agora_types::{AgoraError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// A confirmed token transfer as reported by the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedTransfer {
    pub recipient: String,
    #[serde(rename = "tokenMint")]
    pub token_mint: String,
    #[serde(rename = "amountMinor")]
    pub amount_minor: u64,
    pub finalized: bool,
}

/// Minimal JSON-RPC 2.0 client for the ledger endpoints agora needs.
#[derive(Debug, Clone)]
pub struct LedgerRpcClient {
    rpc_url: String,
    http: reqwest::Client,
}

impl LedgerRpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .timeout(RPC_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgoraError::Timeout {
                        operation: format!("ledger {method}"),
                        seconds: RPC_TIMEOUT.as_secs(),
                    }
                } else {
                    AgoraError::upstream("ledger", e.to_string())
                }
            })?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AgoraError::upstream("ledger", e.to_string()))?;

        if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
            return Err(AgoraError::upstream("ledger", error.to_string()));
        }
        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Fetch a recent blockhash to anchor a transaction
    pub async fn latest_blockhash(&self) -> Result<String> {
        let result = self
            .call("getLatestBlockhash", json!([{"commitment": "finalized"}]))
            .await?;
        result["value"]["blockhash"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgoraError::upstream("ledger", "no blockhash in RPC response"))
    }

    /// Best-effort token account balance. `Ok(None)` means the ledger could
    /// not answer; callers treat that as unknown, not as zero.
    pub async fn token_account_balance(&self, token_account: &str) -> Result<Option<u64>> {
        let result = match self
            .call("getTokenAccountBalance", json!([token_account]))
            .await
        {
            Ok(result) => result,
            Err(err) => {
                debug!(error = %err, "balance pre-check unavailable");
                return Ok(None);
            }
        };
        Ok(result["value"]["amount"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .or_else(|| result["value"]["amount"].as_u64()))
    }

    /// Broadcast a signed transaction. Returns the signature the ledger
    /// acknowledges, falling back to the submitted one when the node
    /// echoes nothing back.
    pub async fn send_transaction(&self, transaction_b64: &str, signature: &str) -> Result<String> {
        let result = self
            .call(
                "sendTransaction",
                json!([transaction_b64, {"signature": signature, "commitment": "confirmed"}]),
            )
            .await?;
        Ok(result
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| signature.to_string()))
    }

    /// Look up a settled transaction by signature. `Ok(None)` means the
    /// ledger has no finalized record of it.
    pub async fn confirm_transfer(&self, signature: &str) -> Result<Option<ConfirmedTransfer>> {
        let result = self
            .call(
                "getTransaction",
                json!([signature, {"commitment": "finalized"}]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let finalized = result["finalized"].as_bool().unwrap_or(false);
        let transfer = &result["transfer"];
        let confirmed = ConfirmedTransfer {
            recipient: transfer["recipient"].as_str().unwrap_or_default().to_string(),
            token_mint: transfer["tokenMint"].as_str().unwrap_or_default().to_string(),
            amount_minor: transfer["amountMinor"].as_u64().unwrap_or(0),
            finalized,
        };
        if confirmed.recipient.is_empty() {
            return Ok(None);
        }
        Ok(Some(confirmed))
    }
}
