//! Application state.

use std::sync::Arc;

use faucet_core::Result;
use faucet_store::Ledger;

use crate::config::ServiceConfig;
use crate::engine::ClaimEngine;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The claim engine, which owns the ledger.
    pub engine: Arc<ClaimEngine>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state over `ledger`.
    ///
    /// # Errors
    ///
    /// Returns `FaucetError::Configuration` if the claim policy is invalid.
    pub fn new(ledger: Arc<Ledger>, config: ServiceConfig) -> Result<Self> {
        let engine = ClaimEngine::new(ledger, config.policy.clone())?;

        if config.telegram_bot_token.is_none() {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set - init data cannot be validated");
        } else if !config.require_init_data {
            tracing::warn!("REQUIRE_INIT_DATA is off - requests are trusted as sent");
        }

        Ok(Self::with_engine(engine, config))
    }

    /// Create application state around an existing engine.
    #[must_use]
    pub fn with_engine(engine: ClaimEngine, config: ServiceConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config,
        }
    }

    /// Name of the ledger backend in use.
    #[must_use]
    pub fn ledger_name(&self) -> &'static str {
        self.engine.ledger().backend_name()
    }
}
