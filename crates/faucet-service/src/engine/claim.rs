//! Periodic claims and referrer bonuses.

use chrono::{DateTime, Utc};

use faucet_core::{
    ClaimBoost, ClaimOutcome, ClaimReceipt, Result, Transaction, UserAccount, UserId,
};
use faucet_store::LedgerSession;

use super::ClaimEngine;

impl ClaimEngine {
    /// Process a claim by `user_id` at `now`.
    ///
    /// Creates the account on first contact. During the cooldown nothing is
    /// written and [`ClaimOutcome::Cooldown`] is returned. Otherwise the
    /// reward is drawn, the claimant credited, and the referrer (if any)
    /// credited with its bonus, all in one commit.
    ///
    /// # Errors
    ///
    /// Returns `FaucetError::StorageUnavailable` if the ledger cannot be read
    /// or the commit fails.
    pub async fn process_claim(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        boost: ClaimBoost,
    ) -> Result<ClaimOutcome> {
        let mut session = self.ledger.begin().await;
        let mut account = self.open_account(&mut session, user_id, now).await?;

        if let Some(remaining) = self.policy.cooldown_remaining(account.last_claim_at, now) {
            tracing::debug!(
                user_id = %user_id,
                remaining_secs = %remaining.as_secs(),
                "Claim rejected, cooldown active"
            );
            return Ok(ClaimOutcome::Cooldown { remaining });
        }

        let reward = {
            let mut rng = self.rng.lock().await;
            self.policy.draw_reward(&mut *rng, boost)
        };

        account.balance = account.balance.saturating_add(reward);
        account.last_claim_at = Some(now);
        session.put_account(account.clone());
        session.append_transaction(Transaction::claim(user_id.clone(), reward, now));

        let referrer_bonus = self
            .credit_referrer(&mut session, &account, reward, now)
            .await?;

        session.commit().await?;

        tracing::info!(
            user_id = %user_id,
            reward = %reward,
            new_balance = %account.balance,
            referrer_bonus = %referrer_bonus,
            watched_ad = %matches!(boost, ClaimBoost::WatchedAd),
            "Claim processed"
        );

        Ok(ClaimOutcome::Success(ClaimReceipt {
            new_balance: account.balance,
            reward,
            referrer_bonus,
            claimed_at: now,
        }))
    }

    /// Stage the referrer's bonus for a claim. Returns the bonus credited.
    async fn credit_referrer(
        &self,
        session: &mut LedgerSession<'_>,
        claimant: &UserAccount,
        reward: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let Some(referrer_id) = claimant.referrer_id.as_ref() else {
            return Ok(0);
        };
        if referrer_id == &claimant.user_id {
            tracing::warn!(user_id = %claimant.user_id, "Ignoring self-referral on record");
            return Ok(0);
        }

        let Some(mut referrer) = session.account(referrer_id).await? else {
            tracing::warn!(
                user_id = %claimant.user_id,
                referrer_id = %referrer_id,
                "Referrer not found, skipping bonus"
            );
            return Ok(0);
        };

        let bonus = self.policy.referral_bonus.bonus_for(reward);
        if bonus <= 0 {
            return Ok(0);
        }

        referrer.balance = referrer.balance.saturating_add(bonus);
        session.put_account(referrer);
        session.append_transaction(Transaction::referral_bonus(
            referrer_id.clone(),
            claimant.user_id.clone(),
            bonus,
            now,
        ));
        Ok(bonus)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::super::test_support::*;
    use faucet_core::{
        ClaimPolicy, FaucetError, ReferralBonus, RewardRange, TransactionKind,
    };

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn receipt(outcome: ClaimOutcome) -> ClaimReceipt {
        match outcome {
            ClaimOutcome::Success(receipt) => receipt,
            ClaimOutcome::Cooldown { remaining } => panic!("unexpected cooldown: {remaining:?}"),
        }
    }

    #[tokio::test]
    async fn fresh_user_claims_then_waits_out_cooldown() {
        let (engine, _backend) = engine();
        let user = uid("42");

        let first = receipt(
            engine
                .process_claim(&user, t0(), ClaimBoost::Standard)
                .await
                .unwrap(),
        );
        assert!((10..=100).contains(&first.new_balance));
        assert_eq!(first.reward, first.new_balance);

        let second = engine
            .process_claim(&user, t0() + chrono::Duration::seconds(10), ClaimBoost::Standard)
            .await
            .unwrap();
        assert_eq!(
            second,
            ClaimOutcome::Cooldown {
                remaining: Duration::from_secs(290)
            }
        );

        let third = receipt(
            engine
                .process_claim(&user, t0() + chrono::Duration::seconds(301), ClaimBoost::Standard)
                .await
                .unwrap(),
        );
        assert!(third.new_balance > first.new_balance);
        assert_eq!(third.new_balance, first.new_balance + third.reward);
    }

    #[tokio::test]
    async fn rewards_stay_within_range() {
        let (engine, _backend) = engine_with(ClaimPolicy {
            reward_range: RewardRange::new(3, 6).unwrap(),
            cooldown: Duration::ZERO,
            ..ClaimPolicy::default()
        });

        for i in 0..50 {
            let claim = receipt(
                engine
                    .process_claim(
                        &uid("42"),
                        t0() + chrono::Duration::seconds(i),
                        ClaimBoost::Standard,
                    )
                    .await
                    .unwrap(),
            );
            assert!((3..=6).contains(&claim.reward), "reward {}", claim.reward);
        }
    }

    #[tokio::test]
    async fn cooldown_leaves_state_unchanged() {
        let (engine, _backend) = engine();
        let user = uid("42");
        engine
            .process_claim(&user, t0(), ClaimBoost::Standard)
            .await
            .unwrap();
        let before = engine.ledger().get_account(&user).await.unwrap().unwrap();
        let log_before = engine.ledger().list_transactions(&user).await.unwrap();

        let outcome = engine
            .process_claim(&user, t0() + chrono::Duration::seconds(299), ClaimBoost::Standard)
            .await
            .unwrap();
        assert!(matches!(outcome, ClaimOutcome::Cooldown { .. }));

        let after = engine.ledger().get_account(&user).await.unwrap().unwrap();
        assert_eq!(after, before);
        assert_eq!(
            engine.ledger().list_transactions(&user).await.unwrap(),
            log_before
        );
    }

    #[tokio::test]
    async fn watched_ad_multiplies_reward() {
        let (engine, _backend) = engine_with(ClaimPolicy {
            reward_range: RewardRange::new(20, 20).unwrap(),
            ..ClaimPolicy::default()
        });

        let claim = receipt(
            engine
                .process_claim(&uid("42"), t0(), ClaimBoost::WatchedAd)
                .await
                .unwrap(),
        );
        assert_eq!(claim.reward, 40);
    }

    #[tokio::test]
    async fn referrer_earns_percentage_bonus() {
        let (engine, _backend) = engine_with(ClaimPolicy {
            reward_range: RewardRange::new(57, 57).unwrap(),
            ..ClaimPolicy::default()
        });
        engine.update_user(&uid("1"), "Referrer", None, t0()).await.unwrap();
        engine
            .register_referral(&uid("7"), "1", t0())
            .await
            .unwrap();

        let claim = receipt(
            engine
                .process_claim(&uid("7"), t0(), ClaimBoost::Standard)
                .await
                .unwrap(),
        );
        assert_eq!(claim.referrer_bonus, 5);

        let referrer = engine.ledger().get_account(&uid("1")).await.unwrap().unwrap();
        assert_eq!(referrer.balance, 5);
        let log = engine.ledger().list_transactions(&uid("1")).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, TransactionKind::ReferralBonus);
        assert_eq!(log[0].source_user_id, Some(uid("7")));
    }

    #[tokio::test]
    async fn flat_bonus_and_zero_bonus() {
        let (engine, _backend) = engine_with(ClaimPolicy {
            reward_range: RewardRange::new(5, 5).unwrap(),
            referral_bonus: ReferralBonus::Flat(3),
            ..ClaimPolicy::default()
        });
        engine.update_user(&uid("1"), "Referrer", None, t0()).await.unwrap();
        engine.register_referral(&uid("7"), "1", t0()).await.unwrap();
        let claim = receipt(
            engine
                .process_claim(&uid("7"), t0(), ClaimBoost::Standard)
                .await
                .unwrap(),
        );
        assert_eq!(claim.referrer_bonus, 3);

        // 10% of 5 floors to zero: nothing credited, nothing logged.
        let (engine, _backend) = engine_with(ClaimPolicy {
            reward_range: RewardRange::new(5, 5).unwrap(),
            ..ClaimPolicy::default()
        });
        engine.update_user(&uid("1"), "Referrer", None, t0()).await.unwrap();
        engine.register_referral(&uid("7"), "1", t0()).await.unwrap();
        let claim = receipt(
            engine
                .process_claim(&uid("7"), t0(), ClaimBoost::Standard)
                .await
                .unwrap(),
        );
        assert_eq!(claim.referrer_bonus, 0);
        assert!(engine
            .ledger()
            .list_transactions(&uid("1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn missing_referrer_does_not_block_claim() {
        let (engine, backend) = engine();
        // A referrer on record that no longer resolves to an account.
        let mut orphan = UserAccount::new(uid("7"), t0());
        orphan.referrer_id = Some(uid("1"));
        faucet_store::LedgerBackend::apply(
            backend.as_ref(),
            &faucet_store::ChangeSet {
                accounts: vec![orphan],
                ..faucet_store::ChangeSet::default()
            },
        )
        .await
        .unwrap();

        let claim = receipt(
            engine
                .process_claim(&uid("7"), t0(), ClaimBoost::Standard)
                .await
                .unwrap(),
        );
        assert_eq!(claim.referrer_bonus, 0);
        assert!(engine.ledger().get_account(&uid("1")).await.unwrap().is_none());
        assert!(engine
            .ledger()
            .list_transactions(&uid("1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn storage_outage_surfaces_as_unavailable() {
        let (engine, backend) = engine();
        backend.set_unavailable(true);

        let err = engine
            .process_claim(&uid("42"), t0(), ClaimBoost::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, FaucetError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn concurrent_claims_pay_once() {
        let (engine, _backend) = engine();
        let engine = std::sync::Arc::new(engine);
        let user = uid("42");

        let attempts = (0..8).map(|_| {
            let engine = engine.clone();
            let user = user.clone();
            async move {
                engine
                    .process_claim(&user, t0(), ClaimBoost::Standard)
                    .await
                    .unwrap()
            }
        });
        let outcomes = futures::future::join_all(attempts).await;

        let successes = outcomes
            .iter()
            .filter(|o| matches!(o, ClaimOutcome::Success(_)))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(
            engine.ledger().list_transactions(&user).await.unwrap().len(),
            1
        );
    }
}
