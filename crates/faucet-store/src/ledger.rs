//! The ledger: a backend plus the write lock that serializes its mutations.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use faucet_core::{ReferralRecord, Task, Transaction, UserAccount, UserId};

use crate::error::{Result, StoreError};
use crate::LedgerBackend;

/// Writes staged by a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Accounts to insert or overwrite, one entry per user.
    pub accounts: Vec<UserAccount>,
    /// Transactions to append.
    pub transactions: Vec<Transaction>,
    /// Referral records to append.
    pub referrals: Vec<ReferralRecord>,
}

impl ChangeSet {
    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.transactions.is_empty() && self.referrals.is_empty()
    }

    /// The staged version of an account, if any.
    #[must_use]
    pub fn account(&self, user_id: &UserId) -> Option<&UserAccount> {
        self.accounts.iter().find(|a| &a.user_id == user_id)
    }

    /// Stage an account, replacing an earlier staged version of it.
    pub fn upsert_account(&mut self, account: UserAccount) {
        match self
            .accounts
            .iter_mut()
            .find(|a| a.user_id == account.user_id)
        {
            Some(slot) => *slot = account,
            None => self.accounts.push(account),
        }
    }
}

/// A ledger backend guarded by a write lock.
///
/// The lock is held for the whole read-compute-write cycle of a session, so
/// two sessions never interleave, whichever users they touch. This trades
/// throughput (one mutating request at a time per process) for freedom from
/// lost updates on backends that only offer read-then-write.
pub struct Ledger {
    backend: Arc<dyn LedgerBackend>,
    write_lock: Arc<Mutex<()>>,
}

impl Ledger {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Name of the underlying backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Start a session, waiting for any session in progress to finish.
    pub async fn begin(&self) -> LedgerSession<'_> {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        LedgerSession {
            backend: &self.backend,
            guard,
            changes: ChangeSet::default(),
        }
    }

    // =========================================================================
    // Unlocked reads
    // =========================================================================

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        self.backend.get_account(user_id).await
    }

    /// List every account.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn list_accounts(&self) -> Result<Vec<UserAccount>> {
        self.backend.list_accounts().await
    }

    /// List a user's transactions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn list_transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>> {
        self.backend.list_transactions(user_id).await
    }

    /// List referral records naming `referrer_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn list_referrals(&self, referrer_id: &UserId) -> Result<Vec<ReferralRecord>> {
        self.backend.list_referrals(referrer_id).await
    }

    /// List the task catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.backend.list_tasks().await
    }

    /// Connectivity check.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await
    }
}

/// A locked unit of work on the ledger.
///
/// Reads see the session's own staged writes. Nothing reaches the backend
/// until [`commit`](Self::commit).
pub struct LedgerSession<'a> {
    backend: &'a Arc<dyn LedgerBackend>,
    guard: OwnedMutexGuard<()>,
    changes: ChangeSet,
}

impl LedgerSession<'_> {
    /// Get an account, preferring the staged version.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn account(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        if let Some(staged) = self.changes.account(user_id) {
            return Ok(Some(staged.clone()));
        }
        self.backend.get_account(user_id).await
    }

    /// Resolve a user ID or custom referral code to an account.
    ///
    /// An exact user ID match, staged or stored, wins over any code.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn resolve_reference(&self, reference: &str) -> Result<Option<UserAccount>> {
        if let Ok(user_id) = UserId::new(reference) {
            if let Some(account) = self.account(&user_id).await? {
                return Ok(Some(account));
            }
        }
        if let Some(staged) = self
            .changes
            .accounts
            .iter()
            .find(|a| a.answers_to_code(reference))
        {
            return Ok(Some(staged.clone()));
        }
        let found = self.backend.find_by_reference(reference).await?;
        Ok(found.map(|stored| {
            self.changes
                .account(&stored.user_id)
                .cloned()
                .unwrap_or(stored)
        }))
    }

    /// A user's transactions, including staged ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>> {
        let mut transactions = self.backend.list_transactions(user_id).await?;
        transactions.extend(
            self.changes
                .transactions
                .iter()
                .filter(|tx| &tx.user_id == user_id)
                .cloned(),
        );
        Ok(transactions)
    }

    /// The task catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub async fn tasks(&self) -> Result<Vec<Task>> {
        self.backend.list_tasks().await
    }

    /// Stage an account write.
    pub fn put_account(&mut self, account: UserAccount) {
        self.changes.upsert_account(account);
    }

    /// Stage a transaction append.
    pub fn append_transaction(&mut self, transaction: Transaction) {
        self.changes.transactions.push(transaction);
    }

    /// Stage a referral record append.
    pub fn append_referral(&mut self, record: ReferralRecord) {
        self.changes.referrals.push(record);
    }

    /// The writes staged so far.
    #[must_use]
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Apply the staged writes and release the lock.
    ///
    /// The write runs on its own task, which owns the lock until the backend
    /// returns. Dropping the returned future (a request timeout, a client
    /// disconnect) therefore never abandons a half-sent write: the write runs
    /// to completion and later sessions wait for it.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the write fails.
    pub async fn commit(self) -> Result<()> {
        let Self {
            backend,
            guard,
            changes,
        } = self;
        if changes.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            backend = %backend.name(),
            accounts = %changes.accounts.len(),
            transactions = %changes.transactions.len(),
            referrals = %changes.referrals.len(),
            "Committing ledger session"
        );

        let backend = Arc::clone(backend);
        tokio::spawn(async move {
            let result = backend.apply(&changes).await;
            drop(guard);
            result
        })
        .await
        .map_err(|e| StoreError::Database(format!("ledger commit task failed: {e}")))?
    }
}
