//! Route definitions for the registry API

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// All registry routes
pub fn registry_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        // Agents
        .route("/agents/register", post(handlers::agents::register))
        .route("/agents", get(handlers::agents::list))
        .route("/agents/{agent_id}", get(handlers::agents::get))
        .route("/agents/{agent_id}", delete(handlers::agents::unregister))
        .route("/agents/{agent_id}/status", post(handlers::agents::set_status))
        .route("/agents/{agent_id}/subscribe", post(handlers::agents::subscribe))
        .route("/agents/{agent_id}/unsubscribe", post(handlers::agents::unsubscribe))
        .route("/agents/{agent_id}/rate", post(handlers::agents::rate))
        .route("/agents/{agent_id}/ratings", get(handlers::agents::ratings))
        .route("/agents/{agent_id}/reputation", get(handlers::agents::reputation))
        // RFP lifecycle
        .route("/rfp/create", post(handlers::rfp::create))
        .route("/rfp/open", get(handlers::rfp::open))
        .route("/rfp/stats", get(handlers::rfp::stats))
        .route("/rfp/{rfp_id}", get(handlers::rfp::get))
        .route("/rfp/{rfp_id}/bid", post(handlers::rfp::bid))
        .route("/rfp/{rfp_id}/bids", get(handlers::rfp::bids))
        .route("/rfp/{rfp_id}/evaluate", get(handlers::rfp::evaluate))
        .route("/rfp/{rfp_id}/select", post(handlers::rfp::select))
        .route("/rfp/{rfp_id}/cancel", post(handlers::rfp::cancel))
        // Assignments
        .route("/assignments/{assignment_id}", get(handlers::assignments::get))
        .route(
            "/assignments/{assignment_id}/delivery",
            post(handlers::assignments::delivery),
        )
}
