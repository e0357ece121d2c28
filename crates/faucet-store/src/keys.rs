//! Key encoding utilities for `RocksDB`.
//!
//! User IDs are variable-length strings without control characters, so a
//! `0x00` byte after the user ID ends the prefix unambiguously.

use faucet_core::{TransactionId, UserId};

const SEPARATOR: u8 = 0x00;

/// Create an account key from a user ID.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_str().as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a prefix for iterating all entries owned by a user.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.as_str().len() + 1);
    key.extend_from_slice(user_id.as_str().as_bytes());
    key.push(SEPARATOR);
    key
}

/// Create a user-transaction index key.
///
/// Format: `user_id || 0x00 || transaction_id (16 bytes)`
///
/// Since ULIDs are time-ordered, a user's transactions iterate oldest first.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Extract the transaction ID from a user-transaction index key.
#[must_use]
pub fn extract_transaction_id_from_user_key(key: &[u8]) -> Option<TransactionId> {
    let start = key.len().checked_sub(16)?;
    let bytes: [u8; 16] = key[start..].try_into().ok()?;
    Some(TransactionId::from_bytes(bytes))
}

/// Create a referral key.
///
/// Format: `referrer_id || 0x00 || referee_id`
#[must_use]
pub fn referral_key(referrer_id: &UserId, referee_id: &UserId) -> Vec<u8> {
    let mut key = user_prefix(referrer_id);
    key.extend_from_slice(referee_id.as_str().as_bytes());
    key
}

/// Create a task key from its name.
#[must_use]
pub fn task_key(name: &str) -> Vec<u8> {
    name.as_bytes().to_vec()
}
