//! API handlers.
//!
//! The WebApp posts JSON bodies carrying a `user_id` (a string or a bare
//! number) and, on mutating calls, the Telegram `initData` string.

pub mod balance;
pub mod claim;
pub mod health;
pub mod leaderboard;
pub mod referrals;
pub mod tasks;
pub mod telegram;
pub mod users;

use axum::extract::FromRequest;
use chrono::Utc;
use serde_json::Value;

use faucet_core::UserId;

use crate::crypto::verify_init_data;
use crate::error::ApiError;
use crate::state::AppState;

/// JSON body extractor that reports malformed bodies as [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Read the `user_id` field of a request body.
pub(crate) fn parse_user_id(value: Option<&Value>) -> Result<UserId, ApiError> {
    let raw = match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Null) | None => return Err(ApiError::BadRequest("user_id required".into())),
        Some(_) => {
            return Err(ApiError::BadRequest(
                "user_id must be a string or a number".into(),
            ))
        }
    };
    if raw.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id required".into()));
    }
    UserId::new(raw).map_err(|e| ApiError::BadRequest(format!("invalid user_id: {e}")))
}

/// Check that `init_data` was signed by our bot for `user_id`.
///
/// A no-op unless init data enforcement is configured.
pub(crate) fn authorize(
    state: &AppState,
    user_id: &UserId,
    init_data: Option<&str>,
) -> Result<(), ApiError> {
    if !state.config.enforces_init_data() {
        return Ok(());
    }
    let Some(bot_token) = state.config.telegram_bot_token.as_deref() else {
        return Ok(());
    };

    let init_data = init_data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("initData required".into()))?;
    let verified = verify_init_data(
        init_data,
        bot_token,
        state.config.init_data_max_age(),
        Utc::now(),
    )
    .map_err(|e| {
        tracing::debug!(user_id = %user_id, error = %e, "Init data rejected");
        ApiError::Unauthorized(e.to_string())
    })?;

    match verified.user {
        Some(user) if user.id.to_string() == user_id.as_str() => Ok(()),
        _ => {
            tracing::warn!(user_id = %user_id, "Init data signed for another user");
            Err(ApiError::Forbidden(
                "initData does not belong to this user".into(),
            ))
        }
    }
}
