//! Agent registration, discovery and reputation handlers

use std::sync::Arc;

use agora_types::{
    Agent, AgentFilter, AgentId, AgentListResponse, AgentRegistration, AgentStatus, RateRequest,
    Rating, ReputationSummary,
};
use axum::extract::{Path, Query, State};
use axum::Json;

use crate::dto::{Ack, AgentsQuery, RatingsQuery, StatusBody, SubscribeBody};
use crate::{ApiResult, AppState};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<AgentRegistration>,
) -> ApiResult<Json<Agent>> {
    let agent = state.store.register_agent(registration).await?;
    Ok(Json(agent))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AgentsQuery>,
) -> ApiResult<Json<AgentListResponse>> {
    let filter = AgentFilter {
        agent_type: query.agent_type,
        capability: query.capability,
        // Discovery defaults to live agents only
        status: Some(query.status.unwrap_or(AgentStatus::Active)),
    };
    let agents = state.store.list_agents(&filter).await?;
    let count = agents.len();
    Ok(Json(AgentListResponse { agents, count }))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Agent>> {
    let agent = state.store.get_agent(&AgentId::new(agent_id)).await?;
    Ok(Json(agent))
}

pub async fn unregister(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Ack>> {
    state.store.unregister_agent(&AgentId::new(&agent_id)).await?;
    Ok(Json(Ack::ok(format!("agent '{agent_id}' unregistered"))))
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Json<Agent>> {
    let agent = state
        .store
        .set_agent_status(&AgentId::new(agent_id), body.status)
        .await?;
    Ok(Json(agent))
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(body): Json<SubscribeBody>,
) -> ApiResult<Json<Ack>> {
    state
        .store
        .subscribe(&AgentId::new(&agent_id), &body.task_type)
        .await?;
    Ok(Json(Ack::ok(format!(
        "agent '{agent_id}' subscribed to '{}'",
        body.task_type
    ))))
}

pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(body): Json<SubscribeBody>,
) -> ApiResult<Json<Ack>> {
    state
        .store
        .unsubscribe(&AgentId::new(&agent_id), &body.task_type)
        .await?;
    Ok(Json(Ack::ok(format!(
        "agent '{agent_id}' unsubscribed from '{}'",
        body.task_type
    ))))
}

pub async fn rate(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(request): Json<RateRequest>,
) -> ApiResult<Json<Rating>> {
    let rating = state.store.rate(&AgentId::new(agent_id), request).await?;
    Ok(Json(rating))
}

pub async fn ratings(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<RatingsQuery>,
) -> ApiResult<Json<Vec<Rating>>> {
    let ratings = state
        .store
        .list_ratings(&AgentId::new(agent_id), query.limit)
        .await?;
    Ok(Json(ratings))
}

pub async fn reputation(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<ReputationSummary>> {
    let summary = state.store.reputation(&AgentId::new(agent_id)).await?;
    Ok(Json(summary))
}
