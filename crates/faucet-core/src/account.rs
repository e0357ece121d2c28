//! Account types for the faucet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A faucet account, one per user.
///
/// Accounts are created on first contact and never deleted. The balance only
/// grows; the referrer is assigned at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// The user ID (stringified chat id).
    pub user_id: UserId,

    /// Free-text display name.
    pub display_name: String,

    /// Current point balance.
    pub balance: i64,

    /// When the last successful claim happened.
    pub last_claim_at: Option<DateTime<Utc>>,

    /// The account that referred this one, if any.
    pub referrer_id: Option<UserId>,

    /// Code others use to name this account as their referrer.
    pub referral_code: String,

    /// When the account was first seen.
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// Create a new account with zero balance and a placeholder name.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            display_name: Self::placeholder_name(&user_id),
            referral_code: user_id.to_string(),
            user_id,
            balance: 0,
            last_claim_at: None,
            referrer_id: None,
            created_at: now,
        }
    }

    /// The generated display name used until the user supplies one.
    #[must_use]
    pub fn placeholder_name(user_id: &UserId) -> String {
        format!("Player {user_id}")
    }

    /// Whether the account carries a referral code other than its own user ID.
    #[must_use]
    pub fn has_custom_code(&self) -> bool {
        self.referral_code != self.user_id.as_str()
    }

    /// Whether `reference` matches this account's custom referral code.
    ///
    /// The default code (the user ID itself) never matches here; plain user
    /// IDs are resolved by exact ID before any code is considered.
    #[must_use]
    pub fn answers_to_code(&self, reference: &str) -> bool {
        self.has_custom_code() && self.referral_code == reference
    }

    /// Read-only view returned by balance queries.
    #[must_use]
    pub fn balance_view(&self) -> BalanceView {
        BalanceView {
            balance: self.balance,
            last_claim_at: self.last_claim_at,
            referral_code: self.referral_code.clone(),
        }
    }
}

/// Result of a balance query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    /// Current point balance.
    pub balance: i64,
    /// When the last successful claim happened.
    pub last_claim_at: Option<DateTime<Utc>>,
    /// The user's referral code.
    pub referral_code: String,
}

impl BalanceView {
    /// The view for a user the ledger has never seen.
    #[must_use]
    pub fn unknown(user_id: &UserId) -> Self {
        Self {
            balance: 0,
            last_claim_at: None,
            referral_code: user_id.to_string(),
        }
    }
}
