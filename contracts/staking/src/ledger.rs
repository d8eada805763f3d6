//! Per-record accounting: stake balances, accrual windows and the reward formula.
//!
//! Nothing here reads the chain. Every time-dependent function takes `now`
//! (nanoseconds) from the caller, so the contract decides which clock is used
//! and tests can pick any instant they like.

use near_sdk::borsh::{self, BorshDeserialize, BorshSerialize};
use primitive_types::U256;

use crate::errors::StakingError;

/// Fixed-point scale of `reward_rate`: a rate of `RATE_DENOMINATOR` pays one
/// unit per staked unit per second.
pub const RATE_DENOMINATOR: u128 = 1_000_000_000_000_000_000_000_000;
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Linear reward for `amount` staked over `elapsed_seconds`.
pub fn reward_for(amount: u128, reward_rate: u128, elapsed_seconds: u64) -> Result<u128, StakingError> {
    // Divide by the scaling factor last to maintain precision
    let scaled = U256::from(amount)
        .checked_mul(U256::from(reward_rate))
        .and_then(|x| x.checked_mul(U256::from(elapsed_seconds)))
        .ok_or(StakingError::RewardOverflow)?;
    let reward = scaled / U256::from(RATE_DENOMINATOR);
    if reward > U256::from(u128::MAX) {
        return Err(StakingError::RewardOverflow);
    }
    Ok(reward.as_u128())
}

#[derive(BorshDeserialize, BorshSerialize, Clone, Debug, Default, PartialEq)]
pub struct StakeRecord {
    pub amount_staked: u128,
    pub staked_at: u64,
    /// Start of the open accrual window.
    pub last_accrual_at: u64,
    /// Reward earned in closed windows and not paid out yet.
    pub settled_reward: u128,
}

impl StakeRecord {
    pub fn new(now: u64) -> Self {
        Self {
            amount_staked: 0,
            staked_at: now,
            last_accrual_at: now,
            settled_reward: 0,
        }
    }

    pub fn elapsed_seconds(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_accrual_at) / NANOS_PER_SECOND
    }

    /// Everything withdrawable right now: settled reward plus the open window.
    pub fn pending_reward(&self, reward_rate: u128, now: u64) -> Result<u128, StakingError> {
        let accrued = reward_for(self.amount_staked, reward_rate, self.elapsed_seconds(now))?;
        self.settled_reward
            .checked_add(accrued)
            .ok_or(StakingError::RewardOverflow)
    }

    /// Closes the open window into `settled_reward` and starts a new one at
    /// `now`. Saturates instead of failing so a balance change that already
    /// moved tokens can always be recorded.
    pub fn checkpoint(&mut self, reward_rate: u128, now: u64) {
        self.settled_reward = self.pending_reward(reward_rate, now).unwrap_or(u128::MAX);
        self.last_accrual_at = now;
    }

    /// Adds `amount` and restarts the accrual window at `now`. Returns the
    /// reward owed up to `now`; the caller pays it out.
    pub fn credit(&mut self, amount: u128, reward_rate: u128, now: u64) -> Result<u128, StakingError> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let new_amount = self
            .amount_staked
            .checked_add(amount)
            .ok_or(StakingError::StakeLimitExceeded)?;
        let owed = self.pending_reward(reward_rate, now)?;
        self.amount_staked = new_amount;
        self.settle_payout(now);
        Ok(owed)
    }

    /// Takes `amount` out of the stake. The reward accrued so far moves into
    /// `settled_reward`, so `last_accrual_at` advances to `now` while the
    /// withdrawable reward stays the same.
    pub fn debit(&mut self, amount: u128, reward_rate: u128, now: u64) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        if amount > self.amount_staked {
            return Err(StakingError::InsufficientStakedBalance);
        }
        self.checkpoint(reward_rate, now);
        self.amount_staked -= amount;
        Ok(())
    }

    /// Marks everything accrued up to `accrued_until` as paid.
    pub fn settle_payout(&mut self, accrued_until: u64) {
        self.settled_reward = 0;
        self.last_accrual_at = accrued_until;
    }

    pub fn is_active(&self) -> bool {
        self.amount_staked > 0
    }
}

/// Ledger-side bookkeeping for one registered asset.
#[derive(BorshDeserialize, BorshSerialize, Clone, Debug, PartialEq)]
pub struct AssetPool {
    pub total_staked: u128,
    /// Tokens held for reward payouts, separate from staked principal.
    pub reward_pool: u128,
    pub is_enabled: bool,
    pub registered_at: u64,
}

impl AssetPool {
    pub fn new(now: u64) -> Self {
        Self {
            total_staked: 0,
            reward_pool: 0,
            is_enabled: true,
            registered_at: now,
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;
    const RATE: u128 = 1_000_000_000_000_000_000;
    const DAY_NS: u64 = 24 * 60 * 60 * NANOS_PER_SECOND;

    #[test]
    fn test_reward_for_zero_inputs() {
        assert_eq!(reward_for(0, RATE, 1000), Ok(0));
        assert_eq!(reward_for(100 * ONE_TOKEN, 0, 1000), Ok(0));
        assert_eq!(reward_for(100 * ONE_TOKEN, RATE, 0), Ok(0));
    }

    #[test]
    fn test_reward_for_matches_formula() {
        // 100 tokens at 10^-6 per second for one hour
        let reward = reward_for(100 * ONE_TOKEN, RATE, 3600).unwrap();
        assert_eq!(reward, 100 * ONE_TOKEN * 3600 / 1_000_000);
    }

    #[test]
    fn test_reward_for_proportional_to_stake() {
        let rewards1 = reward_for(10 * ONE_TOKEN, RATE, 1000).unwrap();
        let rewards2 = reward_for(20 * ONE_TOKEN, RATE, 1000).unwrap();
        assert_eq!(rewards2, rewards1 * 2, "Rewards should be proportional to stake");
    }

    #[test]
    fn test_reward_for_overflow() {
        assert_eq!(
            reward_for(u128::MAX, u128::MAX, u64::MAX),
            Err(StakingError::RewardOverflow)
        );
    }

    #[test]
    fn test_elapsed_seconds_truncates_and_never_underflows() {
        let record = StakeRecord::new(10 * NANOS_PER_SECOND);
        assert_eq!(record.elapsed_seconds(10 * NANOS_PER_SECOND + 999_999_999), 0);
        assert_eq!(record.elapsed_seconds(12 * NANOS_PER_SECOND), 2);
        assert_eq!(record.elapsed_seconds(0), 0);
    }

    #[test]
    fn test_pending_reward_grows_with_time() {
        let mut record = StakeRecord::new(0);
        record.credit(100 * ONE_TOKEN, RATE, 0).unwrap();

        assert_eq!(record.pending_reward(RATE, 0).unwrap(), 0);
        let one_day = record.pending_reward(RATE, DAY_NS).unwrap();
        let seven_days = record.pending_reward(RATE, 7 * DAY_NS).unwrap();
        assert!(one_day > 0);
        assert_eq!(seven_days, one_day * 7);
    }

    #[test]
    fn test_first_credit_owes_nothing() {
        let mut record = StakeRecord::new(0);
        assert_eq!(record.credit(100 * ONE_TOKEN, RATE, 0), Ok(0));
        assert_eq!(record.amount_staked, 100 * ONE_TOKEN);
    }

    #[test]
    fn test_credit_settles_previous_window() {
        let mut record = StakeRecord::new(0);
        record.credit(100 * ONE_TOKEN, RATE, 0).unwrap();
        let before = record.pending_reward(RATE, DAY_NS).unwrap();

        let owed = record.credit(50 * ONE_TOKEN, RATE, DAY_NS).unwrap();

        assert_eq!(owed, before);
        assert_eq!(record.amount_staked, 150 * ONE_TOKEN);
        assert_eq!(record.settled_reward, 0);
        assert_eq!(record.last_accrual_at, DAY_NS);
        assert_eq!(record.staked_at, 0);
        assert_eq!(record.pending_reward(RATE, DAY_NS).unwrap(), 0);
    }

    #[test]
    fn test_credit_owes_settled_reward_too() {
        let mut record = StakeRecord::new(0);
        record.credit(30 * ONE_TOKEN, RATE, 0).unwrap();
        record.debit(30 * ONE_TOKEN, RATE, DAY_NS).unwrap();
        let settled = record.settled_reward;

        let owed = record.credit(10 * ONE_TOKEN, RATE, 2 * DAY_NS).unwrap();

        assert_eq!(owed, settled);
        assert_eq!(record.settled_reward, 0);
    }

    #[test]
    fn test_credit_zero_rejected() {
        let mut record = StakeRecord::new(0);
        assert_eq!(record.credit(0, RATE, 0), Err(StakingError::InvalidAmount));
    }

    #[test]
    fn test_credit_overflow_leaves_record_untouched() {
        let mut record = StakeRecord::new(0);
        record.credit(u128::MAX, 0, 0).unwrap();
        let snapshot = record.clone();

        assert_eq!(record.credit(1, RATE, DAY_NS), Err(StakingError::StakeLimitExceeded));
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_debit_keeps_reward_and_reduces_balance() {
        let mut record = StakeRecord::new(0);
        record.credit(100 * ONE_TOKEN, RATE, 0).unwrap();
        let before = record.pending_reward(RATE, DAY_NS).unwrap();

        record.debit(20 * ONE_TOKEN, RATE, DAY_NS).unwrap();

        assert_eq!(record.amount_staked, 80 * ONE_TOKEN);
        assert_eq!(record.last_accrual_at, DAY_NS);
        assert_eq!(record.pending_reward(RATE, DAY_NS).unwrap(), before);
        let next_day = record.pending_reward(RATE, 2 * DAY_NS).unwrap();
        assert_eq!(next_day - before, reward_for(80 * ONE_TOKEN, RATE, 86_400).unwrap());
    }

    #[test]
    fn test_debit_more_than_staked_leaves_record_untouched() {
        let mut record = StakeRecord::new(0);
        record.credit(30 * ONE_TOKEN, RATE, 0).unwrap();
        let snapshot = record.clone();

        assert_eq!(
            record.debit(50 * ONE_TOKEN, RATE, DAY_NS),
            Err(StakingError::InsufficientStakedBalance)
        );
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_debit_to_zero_keeps_record_inactive() {
        let mut record = StakeRecord::new(0);
        record.credit(30 * ONE_TOKEN, RATE, 0).unwrap();
        record.debit(30 * ONE_TOKEN, RATE, DAY_NS).unwrap();

        assert!(!record.is_active());
        assert!(record.settled_reward > 0);
    }

    #[test]
    fn test_settle_payout_restarts_window() {
        let mut record = StakeRecord::new(0);
        record.credit(100 * ONE_TOKEN, RATE, 0).unwrap();
        record.checkpoint(RATE, DAY_NS);

        record.settle_payout(2 * DAY_NS);

        assert_eq!(record.settled_reward, 0);
        assert_eq!(record.pending_reward(RATE, 2 * DAY_NS).unwrap(), 0);
    }

    #[test]
    fn test_checkpoint_saturates() {
        let mut record = StakeRecord {
            amount_staked: u128::MAX,
            staked_at: 0,
            last_accrual_at: 0,
            settled_reward: u128::MAX,
        };
        record.checkpoint(RATE, DAY_NS);
        assert_eq!(record.settled_reward, u128::MAX);
        assert_eq!(record.last_accrual_at, DAY_NS);
    }
}
