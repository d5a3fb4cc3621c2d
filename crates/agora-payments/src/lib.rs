//! Agora Payments - the rails between consumer, facilitator and ledger
//!
//! Three pieces, layered bottom-up:
//!
//! - [`LedgerRpcClient`]: thin JSON-RPC client for the ledger node
//!   (blockhash, balances, transaction confirmation lookups)
//! - [`TransactionBuilder`] / [`TokenTransferBuilder`]: construct an
//!   unsigned token transfer, base64-encoded for transport
//! - [`FacilitatorClient`]: the three facilitator operations
//!   (`supported`, `verify`, `settle`)
//! - [`X402Client`]: the payment-gated request flow. Issues the request,
//!   satisfies a 402 challenge by building and settling a payment, retries
//!   exactly once with proof.
//!
//! The consumer never signs fees and never broadcasts: settlement goes
//! through the facilitator, which co-signs as fee payer. That boundary is
//! load-bearing; nothing in this crate touches a private key.

mod ledger;
mod builder;
mod facilitator;
mod x402;

pub use builder::{
    derive_token_account, TokenTransferBuilder, TransactionBuilder, TransferEnvelope,
    TransferRequest, UnsignedTransaction,
};
pub use facilitator::{FacilitatorClient, SettleResponse, SupportedResponse, VerifyResponse};
pub use ledger::{ConfirmedTransfer, LedgerRpcClient};
pub use x402::{PaidResponse, X402Client, X402Config};
