//! API error types and responses.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use faucet_core::FaucetError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid Telegram init data.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Init data valid but for another user.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A user named themselves as referrer.
    #[error("{0}")]
    SelfReferral(String),

    /// The referrer does not exist.
    #[error("{0}")]
    UnknownReferrer(String),

    /// The user already has a referrer.
    #[error("{0}")]
    AlreadyReferred(String),

    /// The task reward was already paid.
    #[error("{0}")]
    TaskAlreadyCompleted(String),

    /// Claim attempted during the cooldown.
    #[error("claim cooldown active: {remaining_seconds}s remaining")]
    Cooldown {
        /// Whole seconds until the next claim is allowed.
        remaining_seconds: u64,
    },

    /// The ledger is unreachable.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: &'static str,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Self::SelfReferral(msg) => (StatusCode::BAD_REQUEST, "self_referral", msg.clone()),
            Self::UnknownReferrer(msg) => {
                (StatusCode::NOT_FOUND, "unknown_referrer", msg.clone())
            }
            Self::AlreadyReferred(msg) => (StatusCode::CONFLICT, "already_referred", msg.clone()),
            Self::TaskAlreadyCompleted(msg) => {
                (StatusCode::CONFLICT, "task_already_completed", msg.clone())
            }
            Self::Cooldown { remaining_seconds } => (
                StatusCode::TOO_MANY_REQUESTS,
                "cooldown",
                format!("Next claim available in {remaining_seconds} seconds"),
            ),
            Self::StorageUnavailable(msg) => {
                tracing::error!(error = %msg, "Ledger unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage_unavailable",
                    "The service is temporarily unavailable, please retry later".to_string(),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let remaining_seconds = match &self {
            Self::Cooldown { remaining_seconds } => Some(*remaining_seconds),
            _ => None,
        };

        let body = ErrorResponse {
            status: "error",
            code,
            message,
            remaining_seconds,
            details: remaining_seconds.map(|s| serde_json::json!({ "remaining_seconds": s })),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = remaining_seconds {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from(seconds));
        }
        response
    }
}

impl From<FaucetError> for ApiError {
    fn from(err: FaucetError) -> Self {
        match err {
            FaucetError::InvalidId(e) => Self::BadRequest(format!("invalid user_id: {e}")),
            FaucetError::AccountNotFound { .. } | FaucetError::TaskNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            FaucetError::SelfReferral { .. } => {
                Self::SelfReferral("You cannot refer yourself".into())
            }
            FaucetError::UnknownReferrer { .. } => Self::UnknownReferrer(err.to_string()),
            FaucetError::AlreadyReferred { .. } => Self::AlreadyReferred(err.to_string()),
            FaucetError::TaskAlreadyCompleted { .. } => Self::TaskAlreadyCompleted(err.to_string()),
            FaucetError::StorageUnavailable(msg) => Self::StorageUnavailable(msg),
            FaucetError::CorruptData(msg) | FaucetError::Configuration(msg) => Self::Internal(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
