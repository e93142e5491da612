//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use promo_ledger_engine::EngineError;
use promo_ledger_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Validation failed with one message per rejected field.
    #[error("validation failed")]
    Validation(Vec<String>),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Conflict - invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Validation(messages) => (
                StatusCode::BAD_REQUEST,
                "validation_failed",
                messages.join("; "),
                Some(serde_json::json!(messages)),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CampaignNotFound(id) => Self::NotFound(format!("campaign not found: {id}")),
            StoreError::AllocationNotFound(id) => {
                Self::NotFound(format!("allocation not found: {id}"))
            }
            StoreError::BalanceNotFound {
                tenant_id,
                entity_id,
            } => Self::NotFound(format!("balance not found: {tenant_id}/{entity_id}")),
            StoreError::CampaignNotPending {
                campaign_id,
                status,
            } => Self::Conflict(format!(
                "campaign {campaign_id} already {}",
                status.as_str()
            )),
            StoreError::AllocationNotActive(id) => {
                Self::Conflict(format!("allocation {id} is no longer active"))
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(e) => Self::Validation(e.messages().to_vec()),
            EngineError::CampaignNotFound(id) => {
                Self::NotFound(format!("campaign not found: {id}"))
            }
            EngineError::AlreadyProcessed {
                campaign_id,
                status,
            } => Self::Conflict(format!(
                "campaign {campaign_id} already {}",
                status.as_str()
            )),
            EngineError::Directory(msg) => Self::ExternalService(msg),
            EngineError::Store(e) => e.into(),
        }
    }
}
