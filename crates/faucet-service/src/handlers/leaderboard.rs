//! Leaderboard handler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::engine::{LeaderboardEntry, DEFAULT_LEADERBOARD_SIZE};
use crate::error::ApiError;
use crate::state::AppState;

/// Largest leaderboard a caller may ask for.
const MAX_LEADERBOARD_SIZE: usize = 100;

/// Leaderboard query parameters.
#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    /// Number of entries (default 10, at most 100).
    pub limit: Option<usize>,
}

/// Leaderboard response.
#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Highest balances first.
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Top balances.
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .min(MAX_LEADERBOARD_SIZE);
    let leaderboard = state.engine.leaderboard(limit).await?;

    Ok(Json(LeaderboardResponse {
        status: "success",
        leaderboard,
    }))
}
