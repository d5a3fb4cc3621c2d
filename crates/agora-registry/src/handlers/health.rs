//! Liveness and service-info handlers

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::{ApiResult, AppState};

pub async fn root(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let stats = state.store.stats().await?;
    Ok(Json(json!({
        "service": "agora-registry",
        "status": "active",
        "agents_registered": stats.total_agents,
        "open_rfps": stats.open_rfps,
    })))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "agora-registry",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
