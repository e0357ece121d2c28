//! Profile handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use faucet_core::UserId;

use crate::engine::ReferralStatus;
use crate::error::ApiError;
use crate::handlers::{authorize, parse_user_id, ApiJson};
use crate::state::AppState;

/// Profile update request.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    /// User ID (string or number).
    pub user_id: Option<Value>,
    /// Display name.
    #[serde(default)]
    pub username: Option<String>,
    /// Referral code or user ID of the referrer, from the deep link.
    #[serde(default)]
    pub referrer_id: Option<Value>,
    /// Telegram WebApp init data.
    #[serde(default, rename = "initData")]
    pub init_data: Option<String>,
}

/// Profile update response.
#[derive(Debug, Serialize)]
pub struct UpdateUserResponse {
    /// Always `success`.
    pub status: &'static str,
    /// The user.
    pub user_id: UserId,
    /// Display name after the update.
    pub username: String,
    /// Current balance.
    pub balance: i64,
    /// Code others use to name this user as referrer.
    pub referral_code: String,
    /// What happened to the supplied referrer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<&'static str>,
}

/// Create or rename a user, registering the referrer from the deep link.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<Json<UpdateUserResponse>, ApiError> {
    let user_id = parse_user_id(body.user_id.as_ref())?;
    authorize(&state, &user_id, body.init_data.as_deref())?;

    let referrer = match body.referrer_id {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let update = state
        .engine
        .update_user(
            &user_id,
            body.username.as_deref().unwrap_or_default(),
            referrer.as_deref(),
            Utc::now(),
        )
        .await?;

    Ok(Json(UpdateUserResponse {
        status: "success",
        user_id: update.account.user_id,
        username: update.account.display_name,
        balance: update.account.balance,
        referral_code: update.account.referral_code,
        referral: update.referral.map(ReferralStatus::as_str),
    }))
}
