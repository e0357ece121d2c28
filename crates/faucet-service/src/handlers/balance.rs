//! Balance and profile handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{RefereeEntry, TaskStatus};
use crate::error::ApiError;
use crate::handlers::{parse_user_id, ApiJson};
use crate::state::AppState;

/// Request body naming a user.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    /// User ID (string or number).
    pub user_id: Option<Value>,
}

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Current balance.
    pub balance: i64,
    /// Last successful claim.
    pub last_claim: Option<DateTime<Utc>>,
    /// Code others use to name this user as referrer.
    pub referral_code: String,
}

/// Get a user's balance. Unknown users read as a zero balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<UserRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(body.user_id.as_ref())?;
    let view = state.engine.get_balance(&user_id).await?;

    Ok(Json(BalanceResponse {
        status: "success",
        balance: view.balance,
        last_claim: view.last_claim_at,
        referral_code: view.referral_code,
    }))
}

/// Everything the WebApp shows on its home screen.
#[derive(Debug, Serialize)]
pub struct UserDataResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Display name.
    pub username: String,
    /// Current balance.
    pub balance: i64,
    /// Last successful claim.
    pub last_claim: Option<DateTime<Utc>>,
    /// Code others use to name this user as referrer.
    pub referral_code: String,
    /// Task catalog with completion flags.
    pub tasks: Vec<TaskStatus>,
    /// The user's referees.
    pub referrals: Vec<RefereeEntry>,
    /// Bonus earned from referees.
    pub total_bonus: i64,
}

/// Get a known user's profile, tasks and referrals in one call.
pub async fn get_user_data(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<UserRequest>,
) -> Result<Json<UserDataResponse>, ApiError> {
    let user_id = parse_user_id(body.user_id.as_ref())?;
    let account = state
        .engine
        .ledger()
        .get_account(&user_id)
        .await
        .map_err(faucet_core::FaucetError::from)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let tasks = state.engine.list_tasks(Some(&user_id)).await?;
    let referrals = state.engine.list_referrals(&user_id).await?;

    Ok(Json(UserDataResponse {
        status: "success",
        username: account.display_name,
        balance: account.balance,
        last_claim: account.last_claim_at,
        referral_code: account.referral_code,
        tasks,
        referrals: referrals.referrals,
        total_bonus: referrals.total_bonus,
    }))
}
