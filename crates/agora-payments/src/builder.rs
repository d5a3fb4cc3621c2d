//! Unsigned transaction construction

use agora_types::{AgoraError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::LedgerRpcClient;

/// Domain separator for deterministic token-account derivation
const TOKEN_ACCOUNT_SEED: &[u8] = b"agora/token-account";

/// Inputs for a single token transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub payer: String,
    pub recipient: String,
    pub token_mint: String,
    pub amount_minor: u64,
    pub network: String,
}

/// An unsigned transaction ready for the facilitator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    /// Base64 transport encoding of the transaction
    pub encoded: String,
    pub blockhash: String,
    pub nonce: String,
}

/// The canonical unsigned-transfer wire format the facilitator accepts.
///
/// The blockhash plus nonce make each envelope unique, which is what makes
/// facilitator settlement idempotent from the caller's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEnvelope {
    pub version: u8,
    pub network: String,
    pub payer: String,
    pub payer_token_account: String,
    pub recipient: String,
    pub recipient_token_account: String,
    pub token_mint: String,
    pub amount_minor: u64,
    pub blockhash: String,
    pub nonce: String,
}

impl TransferEnvelope {
    pub fn encode(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        BASE64.encode(bytes)
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| AgoraError::validation("transaction is not valid base64"))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| AgoraError::validation("transaction envelope is malformed"))
    }
}

/// Derive the token account holding `mint` for `owner`.
///
/// Derivation is deterministic so both sides of a transfer agree on the
/// account without an on-chain lookup.
pub fn derive_token_account(owner: &str, mint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(TOKEN_ACCOUNT_SEED);
    hasher.update(owner.as_bytes());
    hasher.update(mint.as_bytes());
    bs58::encode(hasher.finalize()).into_string()
}

/// Builds an unsigned payment transaction for the target ledger
#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    async fn build_transfer(&self, request: &TransferRequest) -> Result<UnsignedTransaction>;
}

/// Token-transfer builder backed by the ledger JSON-RPC.
///
/// Attaches a recent blockhash and runs a best-effort balance pre-check;
/// a ledger that cannot answer the balance query does not block the
/// transfer.
pub struct TokenTransferBuilder {
    ledger: LedgerRpcClient,
}

impl TokenTransferBuilder {
    pub fn new(ledger: LedgerRpcClient) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl TransactionBuilder for TokenTransferBuilder {
    async fn build_transfer(&self, request: &TransferRequest) -> Result<UnsignedTransaction> {
        if request.recipient.is_empty() {
            return Err(AgoraError::validation("recipient account missing"));
        }
        if request.payer.is_empty() {
            return Err(AgoraError::validation("payer account missing"));
        }
        if request.amount_minor == 0 {
            return Err(AgoraError::validation("transfer amount must be positive"));
        }

        let payer_token_account = derive_token_account(&request.payer, &request.token_mint);
        let recipient_token_account =
            derive_token_account(&request.recipient, &request.token_mint);

        if let Some(balance) = self
            .ledger
            .token_account_balance(&payer_token_account)
            .await?
        {
            if balance < request.amount_minor {
                return Err(AgoraError::SettlementFailed {
                    reason: format!(
                        "insufficient_balance: have {balance}, need {}",
                        request.amount_minor
                    ),
                });
            }
        }

        let blockhash = self.ledger.latest_blockhash().await?;
        let nonce = Uuid::new_v4().to_string();

        let envelope = TransferEnvelope {
            version: 1,
            network: request.network.clone(),
            payer: request.payer.clone(),
            payer_token_account,
            recipient: request.recipient.clone(),
            recipient_token_account,
            token_mint: request.token_mint.clone(),
            amount_minor: request.amount_minor,
            blockhash: blockhash.clone(),
            nonce: nonce.clone(),
        };

        debug!(
            payer = %request.payer,
            recipient = %request.recipient,
            amount_minor = request.amount_minor,
            "built unsigned transfer"
        );

        Ok(UnsignedTransaction {
            encoded: envelope.encode(),
            blockhash,
            nonce,
        })
    }
}
