//! Core types and rules for the points faucet.
//!
//! This crate provides the foundational types used throughout the faucet:
//!
//! - **Identifiers**: `UserId`, `TransactionId`
//! - **Accounts**: `UserAccount`, `BalanceView`
//! - **Ledger entries**: `Transaction`, `TransactionKind`, `ReferralRecord`
//! - **Tasks**: `Task`
//! - **Claims**: `ClaimPolicy`, `RewardRange`, `ReferralBonus`, `ClaimOutcome`
//!
//! # Points
//!
//! Points are whole numbers stored as `i64`. Balances only ever grow: every
//! ledger entry the faucet writes carries a non-negative amount.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod claim;
pub mod error;
pub mod ids;
pub mod task;
pub mod transaction;

pub use account::{BalanceView, UserAccount};
pub use claim::{
    ClaimBoost, ClaimOutcome, ClaimPolicy, ClaimReceipt, ReferralBonus, RewardRange,
    DEFAULT_AD_MULTIPLIER, DEFAULT_COOLDOWN_SECONDS, DEFAULT_REFERRAL_PERCENT,
    DEFAULT_REWARD_MAX, DEFAULT_REWARD_MIN,
};
pub use error::{FaucetError, Result};
pub use ids::{IdError, TransactionId, UserId};
pub use task::Task;
pub use transaction::{ReferralRecord, Transaction, TransactionKind};
