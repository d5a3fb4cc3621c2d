//! x402 payment challenge and proof wire types

use crate::UsdcAmount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the header carrying payment proof on the retry request
pub const PAYMENT_RESPONSE_HEADER: &str = "X-Payment-Response";

/// Body of an HTTP 402 response from a payment-gated endpoint.
///
/// Produced fresh per request, never persisted. `amount_minor` is
/// authoritative; `amount_human` is the same value as a decimal string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentChallenge {
    pub recipient: String,
    pub amount_human: String,
    pub amount_minor: u64,
    pub token_mint: String,
    pub network: String,
    pub facilitator_url: String,
    pub nonce: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl PaymentChallenge {
    pub fn amount(&self) -> UsdcAmount {
        UsdcAmount::from_minor(self.amount_minor)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// JSON value of the `X-Payment-Response` header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentProof {
    pub signature: String,
    pub network: String,
}

impl PaymentProof {
    pub fn to_header_value(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_header_value(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }
}

/// Error payload a provider returns alongside a 402 when a presented proof
/// does not check out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRejection {
    pub error: String,
}
