//! Assignment handlers

use std::sync::Arc;

use agora_types::{AgoraError, Assignment, AssignmentId, RecordDelivery};
use axum::extract::{Path, State};
use axum::Json;

use crate::{ApiError, ApiResult, AppState};

fn parse_assignment_id(raw: &str) -> Result<AssignmentId, ApiError> {
    AssignmentId::parse(raw)
        .map_err(|_| AgoraError::validation(format!("'{raw}' is not a valid assignment id")).into())
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<String>,
) -> ApiResult<Json<Assignment>> {
    let assignment = state
        .store
        .get_assignment(&parse_assignment_id(&assignment_id)?)
        .await?;
    Ok(Json(assignment))
}

pub async fn delivery(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<String>,
    Json(request): Json<RecordDelivery>,
) -> ApiResult<Json<Assignment>> {
    let assignment = state
        .store
        .record_delivery(&parse_assignment_id(&assignment_id)?, &request.tx_signature)
        .await?;
    Ok(Json(assignment))
}
