//! Error types for agora
//!
//! All failure modes are explicit. Variants that can occur after a payment
//! has settled carry the on-chain signature so it is never lost.

use crate::UsdcAmount;
use thiserror::Error;

/// Result type for agora operations
pub type Result<T> = std::result::Result<T, AgoraError>;

/// Agora error kinds
#[derive(Debug, Clone, Error)]
pub enum AgoraError {
    /// Malformed or rule-violating input
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// Entity lookup miss
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    /// State already claimed (duplicate assignment, duplicate rating)
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// Caller is not the principal this operation requires
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// A demanded payment exceeds the caller's ceiling
    #[error("payment of {asked} exceeds budget of {max}")]
    BudgetExceeded { asked: UsdcAmount, max: UsdcAmount },

    /// Bid window closed with zero bids
    #[error("no bids received for RFP {rfp_id}")]
    NoBids { rfp_id: String },

    /// Facilitator refused the settlement or stayed unreachable through
    /// the retry budget; no payment proof exists
    #[error("settlement failed: {reason}")]
    SettlementFailed { reason: String },

    /// Provider rejected a settled payment (second 402 after proof)
    #[error("payment rejected by provider: {reason}")]
    PaymentRejected {
        reason: String,
        signature: Option<String>,
    },

    /// Payment settled on-chain but delivery did not complete
    #[error("delivery failed after payment {signature}: {reason}")]
    DeliveryFailedAfterPayment { signature: String, reason: String },

    /// Registry, facilitator or ledger RPC unreachable
    #[error("upstream {service} unavailable: {reason}")]
    UpstreamUnavailable { service: String, reason: String },

    /// A configured deadline elapsed
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },
}

impl AgoraError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn upstream(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code, used on the wire and in the consumer's
    /// discriminated outcome
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            Self::NoBids { .. } => "NO_BIDS",
            Self::SettlementFailed { .. } => "SETTLEMENT_FAILED",
            Self::PaymentRejected { .. } => "PAYMENT_REJECTED",
            Self::DeliveryFailedAfterPayment { .. } => "DELIVERY_FAILED_AFTER_PAYMENT",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::Timeout { .. } => "TIMEOUT",
        }
    }

    /// Whether retrying the same operation can plausibly succeed.
    ///
    /// Anything that may have moved money is non-retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::Timeout { .. }
        )
    }

    /// The settled on-chain signature this error carries, if any
    pub fn settled_signature(&self) -> Option<&str> {
        match self {
            Self::PaymentRejected { signature, .. } => signature.as_deref(),
            Self::DeliveryFailedAfterPayment { signature, .. } => Some(signature),
            _ => None,
        }
    }

    /// Rebuild an error from its wire form `{code, message}`.
    ///
    /// Structured fields are collapsed into the message; the kind survives.
    pub fn from_wire(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "NOT_FOUND" => Self::NotFound {
                resource: "resource",
                id: message,
            },
            "CONFLICT" => Self::Conflict { reason: message },
            "UNAUTHORIZED" => Self::Unauthorized { reason: message },
            "NO_BIDS" => Self::NoBids { rfp_id: message },
            "SETTLEMENT_FAILED" => Self::SettlementFailed { reason: message },
            "PAYMENT_REJECTED" => Self::PaymentRejected {
                reason: message,
                signature: None,
            },
            "UPSTREAM_UNAVAILABLE" => Self::UpstreamUnavailable {
                service: "registry".to_string(),
                reason: message,
            },
            "TIMEOUT" => Self::Timeout {
                operation: message,
                seconds: 0,
            },
            _ => Self::Validation { reason: message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AgoraError::BudgetExceeded {
            asked: UsdcAmount(300),
            max: UsdcAmount(200),
        };
        assert_eq!(err.error_code(), "BUDGET_EXCEEDED");
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_retriable() {
        assert!(AgoraError::upstream("registry", "connection refused").is_retriable());
        assert!(!AgoraError::conflict("already assigned").is_retriable());
    }

    #[test]
    fn test_signature_is_never_lost() {
        let err = AgoraError::DeliveryFailedAfterPayment {
            signature: "5sig".to_string(),
            reason: "HTTP 500".to_string(),
        };
        assert_eq!(err.settled_signature(), Some("5sig"));

        let rejected = AgoraError::PaymentRejected {
            reason: "second 402".to_string(),
            signature: Some("5sig".to_string()),
        };
        assert_eq!(rejected.settled_signature(), Some("5sig"));
    }

    #[test]
    fn test_wire_roundtrip_preserves_kind() {
        let err = AgoraError::conflict("RFP already assigned");
        let back = AgoraError::from_wire(err.error_code(), "RFP already assigned");
        assert_eq!(back.error_code(), "CONFLICT");
    }
}
