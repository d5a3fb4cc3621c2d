//! Agora Types - Canonical domain types for the agent marketplace
//!
//! This crate contains all foundational types for agora with zero dependencies
//! on other agora crates. It defines the complete type system for:
//!
//! - Identity types (AgentId, RfpId, BidId, AssignmentId, RatingId)
//! - USDC amounts in integer minor units
//! - Agents, RFPs, bids, assignments and ratings
//! - The x402 payment challenge/proof wire types
//!
//! # Architectural Invariants
//!
//! These types support the core marketplace invariants:
//!
//! 1. A bid is never accepted above its RFP's budget
//! 2. At most one assignment exists per RFP
//! 3. Reputation is the running arithmetic mean of received ratings
//! 4. A settled payment signature is never silently dropped

pub mod identity;
pub mod amount;
pub mod agent;
pub mod rfp;
pub mod assignment;
pub mod rating;
pub mod payment;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use agent::*;
pub use rfp::*;
pub use assignment::*;
pub use rating::*;
pub use payment::*;
pub use error::*;

/// Version of the agora types schema
pub const TYPES_VERSION: &str = "0.1.0";
