//! In-memory ledger backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use faucet_core::{ReferralRecord, Task, Transaction, UserAccount, UserId};

use crate::error::{Result, StoreError};
use crate::ledger::ChangeSet;
use crate::LedgerBackend;

#[derive(Default)]
struct State {
    accounts: BTreeMap<UserId, UserAccount>,
    transactions: Vec<Transaction>,
    referrals: Vec<ReferralRecord>,
    tasks: Vec<Task>,
}

/// Process-local backend. Change sets are applied atomically.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with a task catalog.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            state: RwLock::new(State {
                tasks,
                ..State::default()
            }),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: while set, every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                attempts: 1,
                message: "memory backend marked unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        self.check_available()?;
        Ok(self.state.read().await.accounts.get(user_id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<UserAccount>> {
        self.check_available()?;
        Ok(self.state.read().await.accounts.values().cloned().collect())
    }

    async fn list_transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .transactions
            .iter()
            .filter(|tx| &tx.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_referrals(&self, referrer_id: &UserId) -> Result<Vec<ReferralRecord>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .referrals
            .iter()
            .filter(|r| &r.referrer_id == referrer_id)
            .cloned()
            .collect())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.check_available()?;
        Ok(self.state.read().await.tasks.clone())
    }

    async fn apply(&self, changes: &ChangeSet) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        for account in &changes.accounts {
            state
                .accounts
                .insert(account.user_id.clone(), account.clone());
        }
        state
            .transactions
            .extend(changes.transactions.iter().cloned());
        state.referrals.extend(changes.referrals.iter().cloned());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[tokio::test]
    async fn apply_upserts_and_appends() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        let mut account = UserAccount::new(uid("42"), now);
        account.balance = 30;

        let changes = ChangeSet {
            accounts: vec![account.clone()],
            transactions: vec![Transaction::claim(uid("42"), 30, now)],
            referrals: vec![],
        };
        backend.apply(&changes).await.unwrap();

        account.balance = 45;
        let changes = ChangeSet {
            accounts: vec![account],
            transactions: vec![Transaction::claim(uid("42"), 15, now)],
            referrals: vec![],
        };
        backend.apply(&changes).await.unwrap();

        let stored = backend.get_account(&uid("42")).await.unwrap().unwrap();
        assert_eq!(stored.balance, 45);
        assert_eq!(backend.list_accounts().await.unwrap().len(), 1);
        assert_eq!(backend.list_transactions(&uid("42")).await.unwrap().len(), 2);
        assert!(backend.list_transactions(&uid("7")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_by_reference_prefers_user_id() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        let mut first = UserAccount::new(uid("1"), now);
        first.referral_code = "2".into();
        let second = UserAccount::new(uid("2"), now);
        let mut third = UserAccount::new(uid("3"), now);
        third.referral_code = "THREE".into();

        backend
            .apply(&ChangeSet {
                accounts: vec![first, second, third],
                ..ChangeSet::default()
            })
            .await
            .unwrap();

        let found = backend.find_by_reference("2").await.unwrap().unwrap();
        assert_eq!(found.user_id, uid("2"));
        let found = backend.find_by_reference("THREE").await.unwrap().unwrap();
        assert_eq!(found.user_id, uid("3"));
        assert!(backend.find_by_reference("4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn referrals_filtered_by_referrer() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        backend
            .apply(&ChangeSet {
                referrals: vec![
                    ReferralRecord::registered(uid("1"), uid("7"), now),
                    ReferralRecord::registered(uid("2"), uid("8"), now),
                ],
                ..ChangeSet::default()
            })
            .await
            .unwrap();

        let referrals = backend.list_referrals(&uid("1")).await.unwrap();
        assert_eq!(referrals.len(), 1);
        assert_eq!(referrals[0].referee_id, uid("7"));
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let backend = MemoryBackend::with_tasks(vec![Task::new("join", "Join", 10)]);
        assert_eq!(backend.list_tasks().await.unwrap().len(), 1);

        backend.set_unavailable(true);
        assert!(backend.ping().await.is_err());
        assert!(matches!(
            backend.get_account(&uid("1")).await,
            Err(StoreError::Unavailable { .. })
        ));

        backend.set_unavailable(false);
        assert!(backend.ping().await.is_ok());
    }
}
