//! Telegram init data validation.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::crypto::{verify_init_data, InitDataError};
use crate::error::ApiError;
use crate::handlers::ApiJson;
use crate::state::AppState;

/// Shortest string that could be init data.
const MIN_INIT_DATA_LEN: usize = 10;

/// Validation request.
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    /// Raw `Telegram.WebApp.initData`.
    #[serde(default, rename = "initData")]
    pub init_data: Option<String>,
}

/// The Telegram user behind validated init data.
#[derive(Debug, Serialize)]
pub struct TelegramUserResponse {
    /// Telegram user ID, as used for `user_id`.
    pub id: String,
    /// First name.
    pub first_name: String,
    /// Username, if any.
    pub username: Option<String>,
}

/// Validation response.
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Whether the signature was checked against the bot token.
    pub verified: bool,
    /// The user, when the init data names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<TelegramUserResponse>,
    /// Shortcut for `user.id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Validate WebApp init data.
///
/// Without a bot token only the shape is checked and `verified` is false.
pub async fn validate_telegram(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let init_data = body
        .init_data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing initData".into()))?;
    if init_data.len() < MIN_INIT_DATA_LEN {
        return Err(ApiError::BadRequest("Invalid initData format".into()));
    }

    let Some(bot_token) = state.config.telegram_bot_token.as_deref() else {
        return Ok(Json(ValidateResponse {
            status: "success",
            verified: false,
            user: None,
            user_id: None,
        }));
    };

    let data = verify_init_data(
        &init_data,
        bot_token,
        state.config.init_data_max_age(),
        Utc::now(),
    )
    .map_err(|e| match e {
        InitDataError::Malformed(_) => ApiError::BadRequest(e.to_string()),
        _ => ApiError::Unauthorized(e.to_string()),
    })?;

    let user = data.user.map(|u| TelegramUserResponse {
        id: u.id.to_string(),
        first_name: u.first_name,
        username: u.username,
    });
    tracing::debug!(user_id = ?user.as_ref().map(|u| &u.id), "Init data validated");

    Ok(Json(ValidateResponse {
        status: "success",
        verified: true,
        user_id: user.as_ref().map(|u| u.id.clone()),
        user,
    }))
}
