//! Faucet Service - HTTP API for the points faucet WebApp
//!
//! This is the main entry point for the faucet service.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faucet_service::{create_router, open_ledger, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,faucet=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Faucet Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        ledger = ?config.ledger,
        request_timeout_secs = %config.request_timeout_seconds,
        reward_min = %config.policy.reward_range.min(),
        reward_max = %config.policy.reward_range.max(),
        cooldown_secs = %config.policy.cooldown.as_secs(),
        referral_bonus = ?config.policy.referral_bonus,
        telegram_configured = %config.telegram_bot_token.is_some(),
        require_init_data = %config.require_init_data,
        "Service configuration loaded"
    );

    let ledger = open_ledger(&config)?;
    if let Err(e) = ledger.ping().await {
        tracing::warn!(error = %e, "Ledger not reachable at startup - serving degraded");
    }

    // Build app state
    let state = AppState::new(ledger, config.clone())?;

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
