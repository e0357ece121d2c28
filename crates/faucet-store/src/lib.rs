//! Ledger storage for the points faucet.
//!
//! This crate provides storage for accounts, the transaction log, the
//! referral log and the task catalog behind the [`LedgerBackend`] trait, with
//! three implementations:
//!
//! - [`MemoryBackend`]: process-local, used for development and tests
//! - `RocksBackend`: embedded `RocksDB` with column families (feature
//!   `rocksdb-backend`)
//! - [`SheetsBackend`]: a Google spreadsheet accessed through the Sheets v4
//!   REST API, one tab per table
//!
//! # Sessions
//!
//! Backends have no transactions and no compare-and-swap, so every mutation
//! goes through a [`Ledger`]. [`Ledger::begin`] takes the ledger's write lock
//! and hands back a [`LedgerSession`] that reads through the backend, stages
//! writes in a [`ChangeSet`], and applies them with a single
//! [`LedgerBackend::apply`] call on [`LedgerSession::commit`]. Dropping a
//! session without committing discards its writes.
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use faucet_core::{UserAccount, UserId};
//! use faucet_store::{Ledger, MemoryBackend};
//!
//! # async fn example() -> faucet_store::Result<()> {
//! let ledger = Ledger::new(Arc::new(MemoryBackend::new()));
//!
//! let user_id = UserId::new("42").unwrap();
//! let mut session = ledger.begin().await;
//! if session.account(&user_id).await?.is_none() {
//!     session.put_account(UserAccount::new(user_id.clone(), Utc::now()));
//! }
//! session.commit().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
#[cfg(feature = "rocksdb-backend")]
pub mod keys;
pub mod ledger;
pub mod memory;
pub mod retry;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;
pub mod sheets;

pub use error::{Result, StoreError};
pub use ledger::{ChangeSet, Ledger, LedgerSession};
pub use memory::MemoryBackend;
pub use retry::RetryPolicy;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksBackend;
pub use sheets::{ServiceAccountKey, SheetLayout, SheetsBackend, SheetsClient, SheetsCredentials};

use async_trait::async_trait;
use faucet_core::{ReferralRecord, Task, Transaction, UserAccount, UserId};

/// The storage trait behind a [`Ledger`].
///
/// Reads may run concurrently. `apply` is only ever called by a session that
/// holds the ledger's write lock, so implementations need not defend against
/// concurrent writers from the same process.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>>;

    /// List every account.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn list_accounts(&self) -> Result<Vec<UserAccount>>;

    /// Find the account a referral reference names.
    ///
    /// An exact user ID match wins; otherwise the first account whose custom
    /// referral code equals `reference`. Default codes (equal to the owner's
    /// ID) are only reachable through the ID match.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn find_by_reference(&self, reference: &str) -> Result<Option<UserAccount>> {
        let accounts = self.list_accounts().await?;
        let by_id = accounts.iter().find(|a| a.user_id.as_str() == reference);
        Ok(by_id
            .or_else(|| accounts.iter().find(|a| a.answers_to_code(reference)))
            .cloned())
    }

    // =========================================================================
    // Log Operations
    // =========================================================================

    /// List a user's transactions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn list_transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>>;

    /// List referral records naming `referrer_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn list_referrals(&self, referrer_id: &UserId) -> Result<Vec<ReferralRecord>>;

    /// List the task catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply a change set: upsert accounts, then append log entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. Backends document whether a
    /// failed apply may have been partially written.
    async fn apply(&self, changes: &ChangeSet) -> Result<()>;

    /// Cheap connectivity check.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn ping(&self) -> Result<()>;
}
