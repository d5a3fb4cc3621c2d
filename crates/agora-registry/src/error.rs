//! API error handling
//!
//! Store-level errors translate to HTTP statuses deterministically; the
//! body always carries `{code, message}` so clients can rebuild the error
//! kind.

use agora_types::AgoraError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// API error response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<AgoraError> for ApiError {
    fn from(err: AgoraError) -> Self {
        let status = match &err {
            AgoraError::Validation { .. } | AgoraError::BudgetExceeded { .. } => {
                StatusCode::BAD_REQUEST
            }
            AgoraError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            AgoraError::NotFound { .. } | AgoraError::NoBids { .. } => StatusCode::NOT_FOUND,
            AgoraError::Conflict { .. } => StatusCode::CONFLICT,
            AgoraError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            AgoraError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AgoraError::SettlementFailed { .. }
            | AgoraError::PaymentRejected { .. }
            | AgoraError::DeliveryFailedAfterPayment { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                code: self.code,
                message: &self.message,
            }),
        )
            .into_response()
    }
}
