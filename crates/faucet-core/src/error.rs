//! Error types for the faucet.

use std::time::Duration;

use crate::ids::IdError;

/// Result type for faucet operations.
pub type Result<T> = std::result::Result<T, FaucetError>;

/// Errors that can occur in faucet operations.
///
/// A claim made during its cooldown is not an error; see
/// [`ClaimOutcome::Cooldown`](crate::ClaimOutcome::Cooldown).
#[derive(Debug, thiserror::Error)]
pub enum FaucetError {
    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Account not found (lookups that require an existing account).
    #[error("account not found: {user_id}")]
    AccountNotFound {
        /// The user ID that was not found.
        user_id: String,
    },

    /// A user tried to name themselves as referrer.
    #[error("self-referral is not allowed: {user_id}")]
    SelfReferral {
        /// The user ID.
        user_id: String,
    },

    /// The named referrer does not resolve to any account.
    #[error("unknown referrer: {referrer}")]
    UnknownReferrer {
        /// The referral code or user ID that did not resolve.
        referrer: String,
    },

    /// The account already has a referrer.
    #[error("account {user_id} already referred by {referrer_id}")]
    AlreadyReferred {
        /// The referred user.
        user_id: String,
        /// The referrer already on record.
        referrer_id: String,
    },

    /// Task not found in the catalog.
    #[error("task not found: {name}")]
    TaskNotFound {
        /// The task name.
        name: String,
    },

    /// Task rewards are paid once per user.
    #[error("task {name} already completed by {user_id}")]
    TaskAlreadyCompleted {
        /// The task name.
        name: String,
        /// The user ID.
        user_id: String,
    },

    /// The ledger could not be reached or a write failed after retries.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Stored data could not be interpreted.
    #[error("corrupt ledger data: {0}")]
    CorruptData(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FaucetError {
    /// Whether this error comes from the storage layer rather than the caller.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::CorruptData(_))
    }
}

/// Round a wait time up to whole seconds for user-facing messages.
#[must_use]
pub fn ceil_seconds(remaining: Duration) -> u64 {
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
