//! Profile updates sent by the WebApp on startup.

use chrono::{DateTime, Utc};
use serde::Serialize;

use faucet_core::{FaucetError, Result, UserAccount, UserId};

use super::ClaimEngine;

/// Longest display name kept; longer names are cut.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// What happened to the referrer supplied with a profile update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    /// The referral was recorded.
    Registered,
    /// The user already had a referrer; nothing changed.
    AlreadyReferred,
    /// The user named themselves.
    SelfReferral,
    /// The reference named no account.
    UnknownReferrer,
    /// The ledger failed while recording the referral.
    Failed,
}

impl ReferralStatus {
    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::AlreadyReferred => "already_referred",
            Self::SelfReferral => "self_referral",
            Self::UnknownReferrer => "unknown_referrer",
            Self::Failed => "failed",
        }
    }
}

/// Result of a profile update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    /// The account after the update.
    pub account: UserAccount,
    /// Outcome of the referral, when a referrer was supplied.
    pub referral: Option<ReferralStatus>,
}

impl ClaimEngine {
    /// Create or rename an account, optionally registering its referrer.
    ///
    /// A referral problem never fails the update; it is reported in
    /// [`UserUpdate::referral`].
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the account cannot be written.
    pub async fn update_user(
        &self,
        user_id: &UserId,
        username: &str,
        referrer: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<UserUpdate> {
        let mut account = {
            let mut session = self.ledger.begin().await;
            let mut account = self.open_account(&mut session, user_id, now).await?;
            let name: String = username.trim().chars().take(MAX_DISPLAY_NAME_CHARS).collect();
            if !name.is_empty() && name != account.display_name {
                account.display_name = name;
                session.put_account(account.clone());
            }
            session.commit().await?;
            account
        };

        let referral = match referrer.map(str::trim).filter(|r| !r.is_empty()) {
            None => None,
            Some(_) if account.referrer_id.is_some() => Some(ReferralStatus::AlreadyReferred),
            Some(reference) => Some(match self.register_referral(user_id, reference, now).await {
                Ok(receipt) => {
                    account.referrer_id = Some(receipt.referrer_id);
                    ReferralStatus::Registered
                }
                Err(FaucetError::AlreadyReferred { .. }) => ReferralStatus::AlreadyReferred,
                Err(FaucetError::SelfReferral { .. }) => ReferralStatus::SelfReferral,
                Err(FaucetError::UnknownReferrer { .. }) => ReferralStatus::UnknownReferrer,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        referrer = %reference,
                        error = %e,
                        "Referral during profile update failed"
                    );
                    ReferralStatus::Failed
                }
            }),
        };

        tracing::debug!(
            user_id = %user_id,
            display_name = %account.display_name,
            referral = ?referral,
            "User updated"
        );

        Ok(UserUpdate { account, referral })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn creates_then_renames() {
        let (engine, _backend) = engine();
        let now = Utc::now();

        let created = engine.update_user(&uid("42"), "", None, now).await.unwrap();
        assert_eq!(created.account.display_name, "Player 42");
        assert_eq!(created.referral, None);

        let renamed = engine
            .update_user(&uid("42"), "  Alice  ", None, now)
            .await
            .unwrap();
        assert_eq!(renamed.account.display_name, "Alice");
        let stored = engine.ledger().get_account(&uid("42")).await.unwrap().unwrap();
        assert_eq!(stored.display_name, "Alice");
        assert_eq!(stored.created_at, created.account.created_at);
    }

    #[tokio::test]
    async fn referral_outcome_is_reported_not_raised() {
        let (engine, _backend) = engine();
        let now = Utc::now();
        engine.update_user(&uid("1"), "One", None, now).await.unwrap();

        let unknown = engine
            .update_user(&uid("7"), "Seven", Some("99"), now)
            .await
            .unwrap();
        assert_eq!(unknown.referral, Some(ReferralStatus::UnknownReferrer));
        assert_eq!(unknown.account.display_name, "Seven");

        let registered = engine
            .update_user(&uid("7"), "Seven", Some("1"), now)
            .await
            .unwrap();
        assert_eq!(registered.referral, Some(ReferralStatus::Registered));
        assert_eq!(registered.account.referrer_id, Some(uid("1")));

        let again = engine
            .update_user(&uid("7"), "Seven", Some("1"), now)
            .await
            .unwrap();
        assert_eq!(again.referral, Some(ReferralStatus::AlreadyReferred));
    }

    #[test]
    fn status_labels() {
        assert_eq!(ReferralStatus::UnknownReferrer.as_str(), "unknown_referrer");
        assert_eq!(ReferralStatus::Registered.as_str(), "registered");
    }
}
