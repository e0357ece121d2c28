//! Ledger entries for the faucet.
//!
//! Every balance change appends a [`Transaction`]; referral registrations
//! append a [`ReferralRecord`]. Neither is ever rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{TransactionId, UserId};

/// A ledger entry recording a balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Points credited.
    pub amount: i64,

    /// What produced the entry.
    pub kind: TransactionKind,

    /// When the entry was written.
    pub timestamp: DateTime<Utc>,

    /// For referral bonuses, the referee whose claim produced the bonus.
    pub source_user_id: Option<UserId>,

    /// For task rewards, the task name.
    pub reference: Option<String>,
}

impl Transaction {
    fn new(user_id: UserId, amount: i64, kind: TransactionKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount,
            kind,
            timestamp,
            source_user_id: None,
            reference: None,
        }
    }

    /// A claim reward.
    #[must_use]
    pub fn claim(user_id: UserId, amount: i64, timestamp: DateTime<Utc>) -> Self {
        Self::new(user_id, amount, TransactionKind::Claim, timestamp)
    }

    /// A referral bonus credited to `referrer_id` for a claim by `referee_id`.
    #[must_use]
    pub fn referral_bonus(
        referrer_id: UserId,
        referee_id: UserId,
        amount: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source_user_id: Some(referee_id),
            ..Self::new(referrer_id, amount, TransactionKind::ReferralBonus, timestamp)
        }
    }

    /// A task reward.
    #[must_use]
    pub fn task(user_id: UserId, task_name: &str, amount: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            reference: Some(task_name.to_string()),
            ..Self::new(user_id, amount, TransactionKind::Task, timestamp)
        }
    }

    /// A one-time signup bonus.
    #[must_use]
    pub fn signup_bonus(user_id: UserId, amount: i64, timestamp: DateTime<Utc>) -> Self {
        Self::new(user_id, amount, TransactionKind::SignupBonus, timestamp)
    }
}

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Periodic faucet claim.
    Claim,

    /// Bonus paid to a referrer when a referee claims.
    ReferralBonus,

    /// One-off task reward.
    Task,

    /// Credit granted when an account is created.
    SignupBonus,
}

impl TransactionKind {
    /// The label used in tabular storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::ReferralBonus => "referral_bonus",
            Self::Task => "task",
            Self::SignupBonus => "signup_bonus",
        }
    }

    /// Parse a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "claim" => Some(Self::Claim),
            "referral_bonus" => Some(Self::ReferralBonus),
            "task" => Some(Self::Task),
            "signup_bonus" => Some(Self::SignupBonus),
            _ => None,
        }
    }
}

/// Bookkeeping entry written when a referral is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRecord {
    /// The account credited with the referral.
    pub referrer_id: UserId,
    /// The newly referred account.
    pub referee_id: UserId,
    /// Points granted at registration (zero today).
    pub points: i64,
    /// When the referral was registered.
    pub timestamp: DateTime<Utc>,
}

impl ReferralRecord {
    /// A zero-point registration record.
    #[must_use]
    pub fn registered(referrer_id: UserId, referee_id: UserId, timestamp: DateTime<Utc>) -> Self {
        Self {
            referrer_id,
            referee_id,
            points: 0,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn referral_bonus_records_source() {
        let tx = Transaction::referral_bonus(uid("1"), uid("7"), 5, Utc::now());
        assert_eq!(tx.user_id, uid("1"));
        assert_eq!(tx.source_user_id, Some(uid("7")));
        assert_eq!(tx.kind, TransactionKind::ReferralBonus);
    }

    #[test]
    fn task_records_name() {
        let tx = Transaction::task(uid("1"), "join-channel", 50, Utc::now());
        assert_eq!(tx.reference.as_deref(), Some("join-channel"));
        assert_eq!(tx.kind, TransactionKind::Task);
    }

    #[test]
    fn kind_labels_parse_back() {
        for kind in [
            TransactionKind::Claim,
            TransactionKind::ReferralBonus,
            TransactionKind::Task,
            TransactionKind::SignupBonus,
        ] {
            assert_eq!(TransactionKind::from_label(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionKind::from_label("refund"), None);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&TransactionKind::ReferralBonus).unwrap();
        assert_eq!(json, "\"referral_bonus\"");
    }
}
