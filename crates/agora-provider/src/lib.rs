//! Agora Provider - the seller side of the marketplace
//!
//! A provider runs two concurrent activities:
//!
//! - a polling loop that watches the registry for open RFPs matching its
//!   capabilities and submits bids through a pluggable [`BidPolicy`]
//! - an HTTP service whose `POST /deliver` endpoint is gated behind x402:
//!   no proof gets a 402 challenge, a proof is verified against the ledger
//!   and checked against a replay cache before the [`ServiceHandler`]
//!   produces the response
//!
//! Business logic lives entirely behind `ServiceHandler`; everything else
//! here is marketplace plumbing.

mod config;
mod endpoint;
mod handler;
mod policy;
mod poller;
mod replay;

pub use config::ProviderConfig;
pub use endpoint::ProviderAgent;
pub use handler::{PriceFeedHandler, ServiceHandler};
pub use policy::{BasePricePolicy, BidDecision, BidPolicy, LlmBidPolicy};
pub use replay::ReplayCache;
