//! Claim handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use faucet_core::error::ceil_seconds;
use faucet_core::{ClaimBoost, ClaimOutcome};

use crate::error::ApiError;
use crate::handlers::{authorize, parse_user_id, ApiJson};
use crate::state::AppState;

/// Claim request.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    /// User ID (string or number).
    pub user_id: Option<Value>,
    /// The user watched an ad before claiming.
    #[serde(default)]
    pub watched_ad: bool,
    /// Telegram WebApp init data.
    #[serde(default, rename = "initData")]
    pub init_data: Option<String>,
}

/// Claim response.
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Balance after the claim.
    pub new_balance: i64,
    /// Points drawn for this claim.
    pub points_earned: i64,
    /// The claim time.
    pub last_claim: DateTime<Utc>,
    /// Points credited to the referrer.
    pub referrer_bonus: i64,
}

/// Claim the periodic reward.
pub async fn claim(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let boost = if body.watched_ad {
        ClaimBoost::WatchedAd
    } else {
        ClaimBoost::Standard
    };
    run_claim(&state, body, boost).await
}

/// Claim after watching an ad; same as `/claim` with `watched_ad: true`.
pub async fn watch_ad(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    run_claim(&state, body, ClaimBoost::WatchedAd).await
}

async fn run_claim(
    state: &AppState,
    body: ClaimRequest,
    boost: ClaimBoost,
) -> Result<Json<ClaimResponse>, ApiError> {
    let user_id = parse_user_id(body.user_id.as_ref())?;
    authorize(state, &user_id, body.init_data.as_deref())?;

    match state
        .engine
        .process_claim(&user_id, Utc::now(), boost)
        .await?
    {
        ClaimOutcome::Success(receipt) => Ok(Json(ClaimResponse {
            status: "success",
            new_balance: receipt.new_balance,
            points_earned: receipt.reward,
            last_claim: receipt.claimed_at,
            referrer_bonus: receipt.referrer_bonus,
        })),
        ClaimOutcome::Cooldown { remaining } => Err(ApiError::Cooldown {
            remaining_seconds: ceil_seconds(remaining),
        }),
    }
}
