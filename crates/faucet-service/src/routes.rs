//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{balance, claim, health, leaderboard, referrals, tasks, telegram, users};
use crate::state::AppState;

/// Maximum concurrent requests for the WebApp API.
///
/// Mutations queue on the ledger lock anyway; this bounds how many wait.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /` - WebApp `index.html` (when `STATIC_DIR` is set)
/// - `GET /static/*` - WebApp assets (when `STATIC_DIR` is set)
///
/// ## WebApp API (rate-limited)
/// - `POST /get-balance` - Balance, last claim and referral code
/// - `POST /user-data` - Profile, tasks and referrals in one call
/// - `POST /claim` - Claim the periodic reward
/// - `POST /watchads` - Claim with the ad multiplier
/// - `GET|POST /get-tasks` - Task catalog
/// - `POST /complete-task` - Collect a task reward
/// - `POST /get-referrals`, `POST /get-friends` - Referees and bonus
/// - `POST /register-referral` - Record a referrer
/// - `POST /update-user` - Create or rename a user
/// - `GET /get-leaderboard` - Top balances
/// - `POST /validate-telegram`, `POST /init-data` - Check WebApp init data
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;
    let static_dir = state.config.static_dir.clone();

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        // Balances
        .route("/get-balance", post(balance::get_balance))
        .route("/user-data", post(balance::get_user_data))
        // Claims
        .route("/claim", post(claim::claim))
        .route("/watchads", post(claim::watch_ad))
        // Tasks
        .route(
            "/get-tasks",
            get(tasks::list_tasks_query).post(tasks::list_tasks_body),
        )
        .route("/complete-task", post(tasks::complete_task))
        // Referrals
        .route("/get-referrals", post(referrals::get_referrals))
        .route("/get-friends", post(referrals::get_referrals))
        .route("/register-referral", post(referrals::register_referral))
        // Users
        .route("/update-user", post(users::update_user))
        .route("/get-leaderboard", get(leaderboard::get_leaderboard))
        // Telegram
        .route("/validate-telegram", post(telegram::validate_telegram))
        .route("/init-data", post(telegram::validate_telegram))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    let mut router = Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .merge(api_routes);

    // WebApp front end
    if let Some(dir) = static_dir {
        tracing::info!(dir = %dir.display(), "Serving WebApp static files");
        router = router
            .route_service("/", ServeFile::new(dir.join("index.html")))
            .nest_service("/static", ServeDir::new(dir));
    }

    router
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
