//! Error types for ledger storage.

use faucet_core::FaucetError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Local database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored row could not be mapped onto a ledger record.
    #[error("corrupt row in {table} row {row}: {reason}")]
    CorruptRow {
        /// Table (sheet) name.
        table: String,
        /// 1-based row number.
        row: usize,
        /// What was wrong.
        reason: String,
    },

    /// A single remote call failed in a way worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The remote API rejected the call.
    #[error("remote API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Credentials were missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Retries were exhausted.
    #[error("ledger unavailable after {attempts} attempts: {message}")]
    Unavailable {
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        message: String,
    },

    /// Backend misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Whether the failed call may succeed if repeated.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<StoreError> for FaucetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Serialization(_) | StoreError::CorruptRow { .. } => {
                Self::CorruptData(err.to_string())
            }
            StoreError::Configuration(msg) => Self::Configuration(msg),
            other => Self::StorageUnavailable(other.to_string()),
        }
    }
}
