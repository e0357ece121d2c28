//! Points faucet HTTP API service.
//!
//! This crate provides the HTTP API behind the faucet's Telegram WebApp:
//!
//! - Periodic claims with an optional ad multiplier
//! - Balances, tasks and the leaderboard
//! - Referral registration and referral bonuses
//! - Telegram WebApp init data validation
//!
//! # Authentication
//!
//! Requests name their user in the body. With `REQUIRE_INIT_DATA=true` and a
//! bot token configured, mutating endpoints also require the WebApp's signed
//! `initData`, and it must belong to that user.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers stay async for routing consistency

pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod storage;

pub use config::{LedgerKind, ServiceConfig};
pub use engine::ClaimEngine;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use storage::open_ledger;
