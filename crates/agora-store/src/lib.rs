//! Agora Store - authoritative in-process marketplace state
//!
//! The store owns every agent, RFP, bid, assignment and rating the registry
//! knows about. All mutations of a single RFP (and its bids/assignment) are
//! serialized; observers reading after a mutation are guaranteed to see it.
//!
//! Persistence is out of scope: the registry is an in-memory coordination
//! service, not a system of record.

mod store;
mod sweeper;

pub use store::{InMemoryStore, MarketStore, RegistryStats};
pub use sweeper::spawn_expiry_sweeper;
