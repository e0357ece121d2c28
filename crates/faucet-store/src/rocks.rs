//! `RocksDB` ledger backend.
//!
//! Each change set is written as one `WriteBatch`, so a commit is atomic.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use faucet_core::{ReferralRecord, Task, Transaction, TransactionId, UserAccount, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::ledger::ChangeSet;
use crate::schema::{all_column_families, cf};
use crate::LedgerBackend;

/// RocksDB-backed ledger.
pub struct RocksBackend {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksBackend {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Replace the task catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn replace_tasks(&self, tasks: &[Task]) -> Result<()> {
        let cf_tasks = self.cf(cf::TASKS)?;
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(&cf_tasks, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            batch.delete_cf(&cf_tasks, key);
        }
        for task in tasks {
            batch.put_cf(&cf_tasks, keys::task_key(&task.name), Self::serialize(task)?);
        }
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        self.db
            .get_cf(&cf, keys::transaction_key(transaction_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Values stored under `prefix` in a column family, in key order.
    fn scan_prefix(&self, name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(name)?;
        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, value));
        }
        Ok(entries)
    }
}

#[async_trait]
impl LedgerBackend for RocksBackend {
    fn name(&self) -> &'static str {
        "rocksdb"
    }

    async fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        self.db
            .get_cf(&cf, keys::account_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    async fn list_accounts(&self) -> Result<Vec<UserAccount>> {
        self.scan_prefix(cf::ACCOUNTS, &[])?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    async fn list_transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::new();
        for (key, _) in self.scan_prefix(cf::TRANSACTIONS_BY_USER, &keys::user_prefix(user_id))? {
            let Some(tx_id) = keys::extract_transaction_id_from_user_key(&key) else {
                tracing::warn!(user_id = %user_id, "Skipping malformed transaction index key");
                continue;
            };
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    async fn list_referrals(&self, referrer_id: &UserId) -> Result<Vec<ReferralRecord>> {
        let mut referrals: Vec<ReferralRecord> = self
            .scan_prefix(cf::REFERRALS, &keys::user_prefix(referrer_id))?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect::<Result<_>>()?;
        referrals.sort_by_key(|r| r.timestamp);
        Ok(referrals)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.scan_prefix(cf::TASKS, &[])?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    async fn apply(&self, changes: &ChangeSet) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let cf_referrals = self.cf(cf::REFERRALS)?;

        let mut batch = WriteBatch::default();

        for account in &changes.accounts {
            batch.put_cf(
                &cf_accounts,
                keys::account_key(&account.user_id),
                Self::serialize(account)?,
            );
        }

        for tx in &changes.transactions {
            batch.put_cf(&cf_tx, keys::transaction_key(&tx.id), Self::serialize(tx)?);
            batch.put_cf(
                &cf_tx_by_user,
                keys::user_transaction_key(&tx.user_id, &tx.id),
                b"",
            );
        }

        for record in &changes.referrals {
            batch.put_cf(
                &cf_referrals,
                keys::referral_key(&record.referrer_id, &record.referee_id),
                Self::serialize(record)?,
            );
        }

        // Write atomically
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn ping(&self) -> Result<()> {
        self.cf(cf::ACCOUNTS).map(|_| ())
    }
}
