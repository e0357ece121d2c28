//! Referral registration and referral statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use faucet_core::{FaucetError, ReferralRecord, Result, TransactionKind, UserId};

use super::ClaimEngine;

/// A successful referral registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationReceipt {
    /// The referred user.
    pub user_id: UserId,
    /// The referrer the reference resolved to.
    pub referrer_id: UserId,
}

/// One referee in a referrer's summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefereeEntry {
    /// The referred user.
    pub user_id: UserId,
    /// Bonus points earned from this referee so far.
    pub points_earned: i64,
    /// When the referral was registered.
    pub timestamp: DateTime<Utc>,
}

/// A referrer's referees and the bonus they produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralSummary {
    /// Referees, oldest first.
    pub referrals: Vec<RefereeEntry>,
    /// Sum of all referral bonuses credited to the referrer.
    pub total_bonus: i64,
}

impl ClaimEngine {
    /// Record that `user_id` was referred by the account `referrer` names.
    ///
    /// `referrer` is matched against user IDs first, then custom referral codes.
    /// The referee's account is created if this is its first contact.
    ///
    /// # Errors
    ///
    /// - `SelfReferral` if the reference names the user themselves
    /// - `UnknownReferrer` if it names no account
    /// - `AlreadyReferred` if the user already has a referrer
    /// - `StorageUnavailable` if the ledger fails
    pub async fn register_referral(
        &self,
        user_id: &UserId,
        referrer: &str,
        now: DateTime<Utc>,
    ) -> Result<RegistrationReceipt> {
        let referrer = referrer.trim();
        if referrer == user_id.as_str() {
            return Err(FaucetError::SelfReferral {
                user_id: user_id.to_string(),
            });
        }

        let mut session = self.ledger.begin().await;

        let referrer_account = session.resolve_reference(referrer).await?.ok_or_else(|| {
            FaucetError::UnknownReferrer {
                referrer: referrer.to_string(),
            }
        })?;
        if &referrer_account.user_id == user_id {
            return Err(FaucetError::SelfReferral {
                user_id: user_id.to_string(),
            });
        }

        let mut account = self.open_account(&mut session, user_id, now).await?;
        if let Some(existing) = &account.referrer_id {
            return Err(FaucetError::AlreadyReferred {
                user_id: user_id.to_string(),
                referrer_id: existing.to_string(),
            });
        }

        account.referrer_id = Some(referrer_account.user_id.clone());
        session.put_account(account);
        session.append_referral(ReferralRecord::registered(
            referrer_account.user_id.clone(),
            user_id.clone(),
            now,
        ));
        session.commit().await?;

        tracing::info!(
            user_id = %user_id,
            referrer_id = %referrer_account.user_id,
            "Referral registered"
        );

        Ok(RegistrationReceipt {
            user_id: user_id.clone(),
            referrer_id: referrer_account.user_id,
        })
    }

    /// The referees of `user_id` with the bonus each produced.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the ledger cannot be read.
    pub async fn list_referrals(&self, user_id: &UserId) -> Result<ReferralSummary> {
        let records = self.ledger.list_referrals(user_id).await?;
        let bonuses: Vec<_> = self
            .ledger
            .list_transactions(user_id)
            .await?
            .into_iter()
            .filter(|tx| tx.kind == TransactionKind::ReferralBonus)
            .collect();

        let referrals = records
            .into_iter()
            .map(|record| RefereeEntry {
                points_earned: bonuses
                    .iter()
                    .filter(|tx| tx.source_user_id.as_ref() == Some(&record.referee_id))
                    .map(|tx| tx.amount)
                    .sum(),
                user_id: record.referee_id,
                timestamp: record.timestamp,
            })
            .collect();

        Ok(ReferralSummary {
            referrals,
            total_bonus: bonuses.iter().map(|tx| tx.amount).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::super::test_support::*;
    use super::*;
    use faucet_core::{ClaimBoost, ClaimPolicy, RewardRange};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn registration_rules() {
        let (engine, _backend) = engine();
        engine.update_user(&uid("1"), "One", None, t0()).await.unwrap();

        assert!(matches!(
            engine.register_referral(&uid("7"), "7", t0()).await,
            Err(FaucetError::SelfReferral { .. })
        ));
        assert!(matches!(
            engine.register_referral(&uid("7"), "99", t0()).await,
            Err(FaucetError::UnknownReferrer { .. })
        ));

        let receipt = engine.register_referral(&uid("7"), "1", t0()).await.unwrap();
        assert_eq!(receipt.referrer_id, uid("1"));

        assert!(matches!(
            engine.register_referral(&uid("7"), "1", t0()).await,
            Err(FaucetError::AlreadyReferred { .. })
        ));

        let referee = engine.ledger().get_account(&uid("7")).await.unwrap().unwrap();
        assert_eq!(referee.referrer_id, Some(uid("1")));
        let records = engine.ledger().list_referrals(&uid("1")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].points, 0);
    }

    #[tokio::test]
    async fn failed_registration_writes_nothing() {
        let (engine, _backend) = engine();
        assert!(engine.register_referral(&uid("7"), "99", t0()).await.is_err());
        assert!(engine.ledger().get_account(&uid("7")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn own_referral_code_counts_as_self_referral() {
        let (engine, backend) = engine();
        let mut account = faucet_core::UserAccount::new(uid("7"), t0());
        account.referral_code = "SEVEN".into();
        faucet_store::LedgerBackend::apply(
            backend.as_ref(),
            &faucet_store::ChangeSet {
                accounts: vec![account],
                ..faucet_store::ChangeSet::default()
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            engine.register_referral(&uid("7"), "SEVEN", t0()).await,
            Err(FaucetError::SelfReferral { .. })
        ));
    }

    #[tokio::test]
    async fn user_ids_win_over_referral_codes() {
        let (engine, backend) = engine();
        let mut coded = faucet_core::UserAccount::new(uid("5"), t0());
        coded.referral_code = "1".into();
        let plain = faucet_core::UserAccount::new(uid("1"), t0());
        faucet_store::LedgerBackend::apply(
            backend.as_ref(),
            &faucet_store::ChangeSet {
                accounts: vec![plain, coded],
                ..faucet_store::ChangeSet::default()
            },
        )
        .await
        .unwrap();

        let receipt = engine.register_referral(&uid("7"), "1", t0()).await.unwrap();
        assert_eq!(receipt.referrer_id, uid("1"));
    }

    #[tokio::test]
    async fn custom_referral_code_resolves() {
        let (engine, backend) = engine();
        let mut coded = faucet_core::UserAccount::new(uid("5"), t0());
        coded.referral_code = "FIVE".into();
        faucet_store::LedgerBackend::apply(
            backend.as_ref(),
            &faucet_store::ChangeSet {
                accounts: vec![coded],
                ..faucet_store::ChangeSet::default()
            },
        )
        .await
        .unwrap();

        let receipt = engine
            .register_referral(&uid("7"), "FIVE", t0())
            .await
            .unwrap();
        assert_eq!(receipt.referrer_id, uid("5"));
    }

    #[tokio::test]
    async fn summary_sums_bonus_per_referee() {
        let (engine, _backend) = engine_with(ClaimPolicy {
            reward_range: RewardRange::new(50, 50).unwrap(),
            cooldown: std::time::Duration::ZERO,
            ..ClaimPolicy::default()
        });
        engine.update_user(&uid("1"), "One", None, t0()).await.unwrap();
        engine.register_referral(&uid("7"), "1", t0()).await.unwrap();
        engine.register_referral(&uid("8"), "1", t0()).await.unwrap();

        for _ in 0..2 {
            engine
                .process_claim(&uid("7"), t0(), ClaimBoost::Standard)
                .await
                .unwrap();
        }

        let summary = engine.list_referrals(&uid("1")).await.unwrap();
        assert_eq!(summary.total_bonus, 10);
        assert_eq!(summary.referrals.len(), 2);
        let seven = summary
            .referrals
            .iter()
            .find(|r| r.user_id == uid("7"))
            .unwrap();
        assert_eq!(seven.points_earned, 10);
        let eight = summary
            .referrals
            .iter()
            .find(|r| r.user_id == uid("8"))
            .unwrap();
        assert_eq!(eight.points_earned, 0);
    }
}
