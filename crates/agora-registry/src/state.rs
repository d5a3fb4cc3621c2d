//! Application state shared across handlers

use agora_store::{InMemoryStore, MarketStore};
use std::sync::Arc;

/// Shared registry state
#[derive(Clone)]
pub struct AppState {
    /// The authoritative market store
    pub store: Arc<dyn MarketStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Fresh state over an empty in-memory store
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
        }
    }
}
