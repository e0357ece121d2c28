//! Read-only queries. These bypass the write lock.

use serde::Serialize;

use faucet_core::{BalanceView, Result, UserId};

use super::ClaimEngine;

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// The user.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// Current balance.
    pub balance: i64,
}

impl ClaimEngine {
    /// Balance, last claim and referral code of a user.
    ///
    /// Unknown users get a zero balance; nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the ledger cannot be read.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<BalanceView> {
        Ok(self
            .ledger
            .get_account(user_id)
            .await?
            .map_or_else(|| BalanceView::unknown(user_id), |a| a.balance_view()))
    }

    /// The `limit` highest balances, ties broken by user ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the ledger cannot be read.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut accounts = self.ledger.list_accounts().await?;
        accounts.sort_by(|a, b| {
            b.balance
                .cmp(&a.balance)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        Ok(accounts
            .into_iter()
            .take(limit)
            .map(|a| LeaderboardEntry {
                user_id: a.user_id,
                username: a.display_name,
                balance: a.balance,
            })
            .collect())
    }
}
