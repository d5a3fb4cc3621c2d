//! The x402 payment-gated request flow
//!
//! One request, at most one settlement:
//!
//! ```text
//! issue -> 402 challenge -> budget check -> build tx -> settle -> retry
//! ```
//!
//! After a successful settlement the client retries exactly once with the
//! `X-Payment-Response` header. A second 402 is terminal. Any failure past
//! settlement carries the on-chain signature out to the caller.

use std::sync::Arc;
use std::time::Duration;

use agora_types::{
    AgoraError, PaymentChallenge, PaymentProof, Result, UsdcAmount, PAYMENT_RESPONSE_HEADER,
};
use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{FacilitatorClient, TransactionBuilder, TransferRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SETTLE_ATTEMPTS: u32 = 3;
const SETTLE_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// x402 client configuration
#[derive(Debug, Clone)]
pub struct X402Config {
    /// The consumer's wallet address (payer)
    pub wallet_address: String,
    /// Expected ledger network name
    pub network: String,
}

/// Result of a paid (or free) request
#[derive(Debug, Clone)]
pub struct PaidResponse {
    pub data: Value,
    /// Present when a payment was settled for this request
    pub signature: Option<String>,
}

/// Payment-gated HTTP client
pub struct X402Client {
    http: reqwest::Client,
    builder: Arc<dyn TransactionBuilder>,
    config: X402Config,
}

impl X402Client {
    pub fn new(builder: Arc<dyn TransactionBuilder>, config: X402Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            builder,
            config,
        }
    }

    pub async fn get(&self, url: &str, max_amount: UsdcAmount) -> Result<PaidResponse> {
        self.request(Method::GET, url, None, max_amount).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: &Value,
        max_amount: UsdcAmount,
    ) -> Result<PaidResponse> {
        self.request(Method::POST, url, Some(body), max_amount).await
    }

    /// Perform a payment-gated request with a spending ceiling.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        max_amount: UsdcAmount,
    ) -> Result<PaidResponse> {
        let initial = self
            .send(method.clone(), url, body, None)
            .await
            .map_err(|e| AgoraError::upstream("provider", e.to_string()))?;

        if initial.status().as_u16() != 402 {
            let status = initial.status();
            let data = read_json(initial).await;
            if status.is_success() {
                return Ok(PaidResponse {
                    data,
                    signature: None,
                });
            }
            return Err(AgoraError::upstream(
                "provider",
                format!("HTTP {status} before payment"),
            ));
        }

        let challenge: PaymentChallenge = initial
            .json()
            .await
            .map_err(|_| AgoraError::validation("malformed payment challenge in 402 response"))?;

        if challenge.is_expired_at(Utc::now()) {
            return Err(AgoraError::validation("payment challenge already expired"));
        }

        let amount = challenge.amount();
        if amount > max_amount {
            debug!(asked = %amount, max = %max_amount, "challenge exceeds ceiling");
            return Err(AgoraError::BudgetExceeded {
                asked: amount,
                max: max_amount,
            });
        }

        let transaction = self
            .builder
            .build_transfer(&TransferRequest {
                payer: self.config.wallet_address.clone(),
                recipient: challenge.recipient.clone(),
                token_mint: challenge.token_mint.clone(),
                amount_minor: challenge.amount_minor,
                network: challenge.network.clone(),
            })
            .await?;

        let facilitator = FacilitatorClient::new(challenge.facilitator_url.clone());

        // Transport failures resubmit the SAME envelope: its blockhash and
        // nonce key the settlement, so the facilitator returns the original
        // signature instead of broadcasting twice. Building a fresh
        // transaction here would mint a new nonce and risk a double
        // payment. Once the attempts are exhausted the failure is terminal,
        // never retriable, because the broadcast may already have landed.
        let settlement = {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match facilitator.settle(&transaction.encoded).await {
                    Ok(settlement) => break settlement,
                    Err(err) if err.is_retriable() && attempt < SETTLE_ATTEMPTS => {
                        warn!(
                            attempt,
                            error = %err,
                            "settle transport failure, resubmitting the same transaction"
                        );
                        tokio::time::sleep(SETTLE_RETRY_BACKOFF).await;
                    }
                    Err(err) => {
                        return Err(AgoraError::SettlementFailed {
                            reason: format!(
                                "facilitator unreachable after {attempt} attempt(s): {err}"
                            ),
                        });
                    }
                }
            }
        };
        if !settlement.success {
            return Err(AgoraError::SettlementFailed {
                reason: settlement
                    .error
                    .unwrap_or_else(|| "facilitator refused settlement".to_string()),
            });
        }
        let signature = settlement.transaction_signature.ok_or_else(|| {
            AgoraError::SettlementFailed {
                reason: "facilitator returned success without a signature".to_string(),
            }
        })?;
        info!(signature = %signature, amount = %amount, "payment settled");

        let proof = PaymentProof {
            signature: signature.clone(),
            network: settlement
                .network
                .unwrap_or_else(|| self.config.network.clone()),
        };

        // Single retry with proof. From here on, the signature must reach
        // the caller whatever happens.
        let retry = match self.send(method, url, body, Some(&proof)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(signature = %signature, error = %e, "retry failed after settlement");
                return Err(AgoraError::DeliveryFailedAfterPayment {
                    signature,
                    reason: e.to_string(),
                });
            }
        };

        let status = retry.status();
        if status.is_success() {
            return Ok(PaidResponse {
                data: read_json(retry).await,
                signature: Some(signature),
            });
        }
        if status.as_u16() == 402 {
            let reason = read_json(retry)
                .await
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("payment proof rejected")
                .to_string();
            return Err(AgoraError::PaymentRejected {
                reason,
                signature: Some(signature),
            });
        }
        Err(AgoraError::DeliveryFailedAfterPayment {
            signature,
            reason: format!("HTTP {status} on paid retry"),
        })
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        proof: Option<&PaymentProof>,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .http
            .request(method, url)
            .timeout(REQUEST_TIMEOUT)
            .header("Content-Type", "application/json");
        if let Some(proof) = proof {
            request = request.header(PAYMENT_RESPONSE_HEADER, proof.to_header_value());
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await
    }
}

async fn read_json(response: reqwest::Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
