//! RFP lifecycle and bidding handlers

use std::sync::Arc;

use agora_evaluator::{score_bids, BidScore, ScoreWeights};
use agora_store::RegistryStats;
use agora_types::{
    AgoraError, Assignment, Bid, CancelRfp, CreateRfp, Rfp, RfpId, RfpListResponse, SelectWinner,
    SubmitBid,
};
use axum::extract::{Path, Query, State};
use axum::Json;

use crate::dto::{EvaluateQuery, OpenRfpsQuery};
use crate::{ApiError, ApiResult, AppState};

fn parse_rfp_id(raw: &str) -> Result<RfpId, ApiError> {
    RfpId::parse(raw)
        .map_err(|_| AgoraError::validation(format!("'{raw}' is not a valid RFP id")).into())
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRfp>,
) -> ApiResult<Json<Rfp>> {
    let rfp = state.store.create_rfp(request).await?;
    Ok(Json(rfp))
}

pub async fn open(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OpenRfpsQuery>,
) -> ApiResult<Json<RfpListResponse>> {
    let rfps = state
        .store
        .list_open_rfps(&query.task_type_list())
        .await?;
    let count = rfps.len();
    Ok(Json(RfpListResponse { rfps, count }))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(rfp_id): Path<String>,
) -> ApiResult<Json<Rfp>> {
    let rfp = state.store.get_rfp(&parse_rfp_id(&rfp_id)?).await?;
    Ok(Json(rfp))
}

pub async fn bid(
    State(state): State<Arc<AppState>>,
    Path(rfp_id): Path<String>,
    Json(request): Json<SubmitBid>,
) -> ApiResult<Json<Bid>> {
    let bid = state
        .store
        .submit_bid(&parse_rfp_id(&rfp_id)?, request)
        .await?;
    Ok(Json(bid))
}

pub async fn bids(
    State(state): State<Arc<AppState>>,
    Path(rfp_id): Path<String>,
) -> ApiResult<Json<Vec<Bid>>> {
    let bids = state.store.list_bids(&parse_rfp_id(&rfp_id)?).await?;
    Ok(Json(bids))
}

/// Deterministic score breakdown for every bid on an RFP. A read-only
/// view; it never selects a winner.
pub async fn evaluate(
    State(state): State<Arc<AppState>>,
    Path(rfp_id): Path<String>,
    Query(query): Query<EvaluateQuery>,
) -> ApiResult<Json<Vec<BidScore>>> {
    let rfp_id = parse_rfp_id(&rfp_id)?;
    let rfp = state.store.get_rfp(&rfp_id).await?;
    let bids = state.store.list_bids(&rfp_id).await?;
    let scores = score_bids(
        &rfp,
        &bids,
        ScoreWeights {
            price: query.price_weight,
            reputation: query.reputation_weight,
            speed: query.speed_weight,
        },
    );
    Ok(Json(scores))
}

pub async fn select(
    State(state): State<Arc<AppState>>,
    Path(rfp_id): Path<String>,
    Json(request): Json<SelectWinner>,
) -> ApiResult<Json<Assignment>> {
    let assignment = state
        .store
        .select_winner(
            &parse_rfp_id(&rfp_id)?,
            &request.bid_id,
            &request.selector_agent_id,
        )
        .await?;
    Ok(Json(assignment))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(rfp_id): Path<String>,
    Json(request): Json<CancelRfp>,
) -> ApiResult<Json<Rfp>> {
    let rfp = state
        .store
        .cancel_rfp(&parse_rfp_id(&rfp_id)?, &request.requester_agent_id)
        .await?;
    Ok(Json(rfp))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<RegistryStats>> {
    let stats = state.store.stats().await?;
    Ok(Json(stats))
}
