//! The claim engine: every faucet rule that touches the ledger.
//!
//! Mutations run inside a [`LedgerSession`], so each one is a single
//! read-compute-commit cycle under the ledger's write lock. Queries read the
//! ledger directly.

mod claim;
mod query;
mod referral;
mod tasks;
mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;

use faucet_core::{ClaimPolicy, Result, Transaction, UserAccount, UserId};
use faucet_store::{Ledger, LedgerSession};

pub use query::LeaderboardEntry;
pub use referral::{ReferralSummary, RegistrationReceipt, RefereeEntry};
pub use tasks::{TaskCompletion, TaskStatus};
pub use users::{ReferralStatus, UserUpdate};

/// Default number of leaderboard entries.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// Applies the faucet rules to a ledger.
pub struct ClaimEngine {
    ledger: Arc<Ledger>,
    policy: ClaimPolicy,
    rng: Mutex<StdRng>,
}

impl ClaimEngine {
    /// Create an engine with an entropy-seeded reward generator.
    ///
    /// # Errors
    ///
    /// Returns `FaucetError::Configuration` if the policy is invalid.
    pub fn new(ledger: Arc<Ledger>, policy: ClaimPolicy) -> Result<Self> {
        Self::with_rng(ledger, policy, StdRng::from_entropy())
    }

    /// Create an engine with a deterministic reward generator.
    ///
    /// # Errors
    ///
    /// Returns `FaucetError::Configuration` if the policy is invalid.
    pub fn with_seed(ledger: Arc<Ledger>, policy: ClaimPolicy, seed: u64) -> Result<Self> {
        Self::with_rng(ledger, policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ledger: Arc<Ledger>, policy: ClaimPolicy, rng: StdRng) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            ledger,
            policy,
            rng: Mutex::new(rng),
        })
    }

    /// The rules in force.
    #[must_use]
    pub fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }

    /// The ledger this engine writes to.
    #[must_use]
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Load an account inside a session, staging its creation (and signup
    /// bonus) on first contact.
    async fn open_account(
        &self,
        session: &mut LedgerSession<'_>,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<UserAccount> {
        if let Some(account) = session.account(user_id).await? {
            return Ok(account);
        }

        let mut account = UserAccount::new(user_id.clone(), now);
        if self.policy.signup_bonus > 0 {
            account.balance = self.policy.signup_bonus;
            session.append_transaction(Transaction::signup_bonus(
                user_id.clone(),
                self.policy.signup_bonus,
                now,
            ));
        }
        tracing::debug!(user_id = %user_id, "Creating account on first contact");
        session.put_account(account.clone());
        Ok(account)
    }
}
