//! Referral handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use faucet_core::UserId;

use crate::engine::RefereeEntry;
use crate::error::ApiError;
use crate::handlers::balance::UserRequest;
use crate::handlers::{authorize, parse_user_id, ApiJson};
use crate::state::AppState;

/// Referral list response.
#[derive(Debug, Serialize)]
pub struct ReferralsResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Referees, oldest first.
    pub referrals: Vec<RefereeEntry>,
    /// Bonus earned from all referees.
    pub total_bonus: i64,
}

/// List the users a user has referred.
pub async fn get_referrals(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<UserRequest>,
) -> Result<Json<ReferralsResponse>, ApiError> {
    let user_id = parse_user_id(body.user_id.as_ref())?;
    let summary = state.engine.list_referrals(&user_id).await?;

    Ok(Json(ReferralsResponse {
        status: "success",
        referrals: summary.referrals,
        total_bonus: summary.total_bonus,
    }))
}

/// Referral registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterReferralRequest {
    /// The referred user.
    pub user_id: Option<Value>,
    /// Referral code or user ID of the referrer.
    pub referrer_id: Option<Value>,
    /// Telegram WebApp init data.
    #[serde(default, rename = "initData")]
    pub init_data: Option<String>,
}

/// Referral registration response.
#[derive(Debug, Serialize)]
pub struct RegisterReferralResponse {
    /// Always `success`.
    pub status: &'static str,
    /// The referred user.
    pub user_id: UserId,
    /// The referrer the reference resolved to.
    pub referrer_id: UserId,
}

/// Record who referred a user.
pub async fn register_referral(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<RegisterReferralRequest>,
) -> Result<Json<RegisterReferralResponse>, ApiError> {
    let user_id = parse_user_id(body.user_id.as_ref())?;
    let referrer = match body.referrer_id {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(ApiError::BadRequest("referrer_id required".into())),
    };
    authorize(&state, &user_id, body.init_data.as_deref())?;

    let receipt = state
        .engine
        .register_referral(&user_id, &referrer, Utc::now())
        .await?;

    Ok(Json(RegisterReferralResponse {
        status: "success",
        user_id: receipt.user_id,
        referrer_id: receipt.referrer_id,
    }))
}
