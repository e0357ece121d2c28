//! Claim rules: reward draws, cooldowns and referral bonuses.
//!
//! Everything here is pure. The claim engine in the service crate feeds these
//! rules the account it read from the ledger and the clock value it was given.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{FaucetError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default lower bound of the claim reward.
pub const DEFAULT_REWARD_MIN: i64 = 10;

/// Default upper bound of the claim reward.
pub const DEFAULT_REWARD_MAX: i64 = 100;

/// Default time between two successful claims (5 minutes).
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 300;

/// Default referral bonus, as a percentage of the referee's reward.
pub const DEFAULT_REFERRAL_PERCENT: u32 = 10;

/// Default reward multiplier for claims made after watching an ad.
pub const DEFAULT_AD_MULTIPLIER: u32 = 2;

/// Inclusive bounds for the random claim reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRange {
    min: i64,
    max: i64,
}

impl RewardRange {
    /// Create a reward range.
    ///
    /// # Errors
    ///
    /// Returns `FaucetError::Configuration` if `min` is negative or greater
    /// than `max`.
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min < 0 {
            return Err(FaucetError::Configuration(format!(
                "reward minimum must be non-negative, got {min}"
            )));
        }
        if min > max {
            return Err(FaucetError::Configuration(format!(
                "reward range is empty: {min} > {max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// Lower bound (inclusive).
    #[must_use]
    pub const fn min(&self) -> i64 {
        self.min
    }

    /// Upper bound (inclusive).
    #[must_use]
    pub const fn max(&self) -> i64 {
        self.max
    }

    /// Whether `amount` lies within the range.
    #[must_use]
    pub const fn contains(&self, amount: i64) -> bool {
        self.min <= amount && amount <= self.max
    }

    /// Draw a reward uniformly from the range.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.gen_range(self.min..=self.max)
    }
}

impl Default for RewardRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_REWARD_MIN,
            max: DEFAULT_REWARD_MAX,
        }
    }
}

/// How a referrer's bonus is derived from a referee's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ReferralBonus {
    /// `floor(reward * percent / 100)`.
    Percent(u32),
    /// A fixed number of points per referee claim.
    Flat(i64),
}

impl ReferralBonus {
    /// Bonus owed to the referrer for a claim worth `reward`.
    #[must_use]
    pub fn bonus_for(&self, reward: i64) -> i64 {
        match *self {
            Self::Percent(percent) => reward.saturating_mul(i64::from(percent)) / 100,
            Self::Flat(amount) => amount,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::Percent(percent) if percent > 100 => Err(FaucetError::Configuration(format!(
                "referral percent must be at most 100, got {percent}"
            ))),
            Self::Flat(amount) if amount < 0 => Err(FaucetError::Configuration(format!(
                "flat referral bonus must be non-negative, got {amount}"
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for ReferralBonus {
    fn default() -> Self {
        Self::Percent(DEFAULT_REFERRAL_PERCENT)
    }
}

/// Optional reward boost requested with a claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClaimBoost {
    /// Plain claim.
    #[default]
    Standard,
    /// The user watched an ad first; the reward is multiplied.
    WatchedAd,
}

/// Tunable economics of the faucet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPolicy {
    /// Bounds of the random reward.
    pub reward_range: RewardRange,
    /// Minimum time between two successful claims.
    pub cooldown: Duration,
    /// Referrer bonus rule.
    pub referral_bonus: ReferralBonus,
    /// Points credited when an account is created.
    pub signup_bonus: i64,
    /// Reward multiplier for [`ClaimBoost::WatchedAd`].
    pub ad_multiplier: u32,
}

impl ClaimPolicy {
    /// Check the policy for values the engine cannot honor.
    ///
    /// # Errors
    ///
    /// Returns `FaucetError::Configuration` describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        self.referral_bonus.validate()?;
        if self.signup_bonus < 0 {
            return Err(FaucetError::Configuration(format!(
                "signup bonus must be non-negative, got {}",
                self.signup_bonus
            )));
        }
        if self.ad_multiplier == 0 {
            return Err(FaucetError::Configuration(
                "ad multiplier must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Time left before the next claim is allowed, or `None` if a claim is
    /// allowed at `now`.
    ///
    /// A last-claim time in the future (clock skew between writers) counts as
    /// zero elapsed time.
    #[must_use]
    pub fn cooldown_remaining(
        &self,
        last_claim_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let last = last_claim_at?;
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        self.cooldown
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    /// Draw the reward for a claim.
    pub fn draw_reward<R: Rng + ?Sized>(&self, rng: &mut R, boost: ClaimBoost) -> i64 {
        let base = self.reward_range.draw(rng);
        match boost {
            ClaimBoost::Standard => base,
            ClaimBoost::WatchedAd => base.saturating_mul(i64::from(self.ad_multiplier)),
        }
    }
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            reward_range: RewardRange::default(),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECONDS),
            referral_bonus: ReferralBonus::default(),
            signup_bonus: 0,
            ad_multiplier: DEFAULT_AD_MULTIPLIER,
        }
    }
}

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim went through.
    Success(ClaimReceipt),
    /// The user claimed too recently; nothing was written.
    Cooldown {
        /// Time until the next claim is allowed.
        remaining: Duration,
    },
}

/// Details of a successful claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    /// Claimant balance after the reward.
    pub new_balance: i64,
    /// Points drawn for this claim.
    pub reward: i64,
    /// Points credited to the referrer (zero when there is none).
    pub referrer_bonus: i64,
    /// The claim time, now stored as the account's last claim.
    pub claimed_at: DateTime<Utc>,
}
