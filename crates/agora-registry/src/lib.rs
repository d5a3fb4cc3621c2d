//! Agora Registry - HTTP facade over the market store
//!
//! # API Structure
//!
//! ```text
//! /
//! ├── /agents            - registration, discovery, reputation
//! ├── /rfp               - RFP lifecycle and bidding
//! ├── /assignments       - delivery records
//! └── /health            - liveness
//! ```
//!
//! The registry holds no state of its own: every handler is a thin
//! translation between JSON and the store, with store errors mapped
//! deterministically onto 4xx/5xx responses.

pub mod error;
pub mod state;
pub mod routes;
pub mod handlers;
pub mod dto;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Create the registry router with tracing and CORS layers
pub fn create_router(state: Arc<AppState>) -> Router {
    routes::registry_routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Create a minimal router for testing (no middleware layers)
pub fn create_test_router(state: Arc<AppState>) -> Router {
    routes::registry_routes().with_state(state)
}
