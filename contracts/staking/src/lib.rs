// Time-based staking ledger for NEP-141 assets.
// Participants approve the ledger on an asset and stake; reward accrues linearly
// per second on the staked balance and is paid from a per-asset reward pool.
// Every mutation that moves tokens locks its (participant, asset) record until
// the asset call resolves, then commits or rolls back in the callback.

mod errors;
mod events;
mod external;
pub mod ledger;

pub use errors::StakingError;
pub use events::StakingEvent;

use near_contract_standards::fungible_token::receiver::FungibleTokenReceiver;
use near_sdk::borsh::{self, BorshSerialize};
use near_sdk::collections::{LookupMap, LookupSet, UnorderedMap};
use near_sdk::json_types::U128;
use near_sdk::serde::{Deserialize, Serialize};
use near_sdk::{
    env, near, require, AccountId, BorshStorageKey, FunctionError, Gas, NearToken,
    PanicOnDefault, Promise, PromiseOrValue, PromiseResult,
};
use schemars::JsonSchema;

use crate::external::ext_asset;
use crate::ledger::{AssetPool, StakeRecord};

const GAS_FOR_FT_TRANSFER: Gas = Gas::from_tgas(25);
const GAS_FOR_RESOLVE: Gas = Gas::from_tgas(15);
// Stake resolution may pay out settled reward: transfer + resolve + own work.
const GAS_FOR_RESOLVE_STAKE: Gas = Gas::from_tgas(60);
const ONE_YOCTO: NearToken = NearToken::from_yoctonear(1);

type RecordKey = (AccountId, AccountId);

#[derive(BorshStorageKey, BorshSerialize)]
enum StorageKey {
    Stakes,
    ParticipantAssets,
    Assets,
    InFlight,
}

/// `msg` accepted by `ft_on_transfer`, e.g. `{"action":"stake"}`.
#[derive(Serialize, Deserialize)]
#[serde(crate = "near_sdk::serde")]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransferAction {
    Stake,
    FundRewards,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(crate = "near_sdk::serde")]
#[schemars(crate = "schemars")]
pub struct StakeRecordView {
    #[schemars(with = "String")]
    pub participant: AccountId,
    #[schemars(with = "String")]
    pub asset: AccountId,
    #[schemars(with = "String")]
    pub amount_staked: U128,
    pub staked_at: u64,
    pub last_accrual_at: u64,
    #[schemars(with = "String")]
    pub settled_reward: U128,
}

impl StakeRecordView {
    fn from_parts(participant: AccountId, asset: AccountId, record: StakeRecord) -> Self {
        Self {
            participant,
            asset,
            amount_staked: U128(record.amount_staked),
            staked_at: record.staked_at,
            last_accrual_at: record.last_accrual_at,
            settled_reward: U128(record.settled_reward),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(crate = "near_sdk::serde")]
#[schemars(crate = "schemars")]
pub struct AssetPoolView {
    #[schemars(with = "String")]
    pub asset: AccountId,
    #[schemars(with = "String")]
    pub total_staked: U128,
    #[schemars(with = "String")]
    pub reward_pool: U128,
    pub is_enabled: bool,
    pub registered_at: u64,
}

impl AssetPoolView {
    fn from_parts(asset: AccountId, pool: AssetPool) -> Self {
        Self {
            asset,
            total_staked: U128(pool.total_staked),
            reward_pool: U128(pool.reward_pool),
            is_enabled: pool.is_enabled,
            registered_at: pool.registered_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(crate = "near_sdk::serde")]
#[schemars(crate = "schemars")]
pub struct ConfigView {
    #[schemars(with = "String")]
    pub owner_id: AccountId,
    #[schemars(with = "String")]
    pub default_asset: AccountId,
    /// Reward per staked unit per second, scaled by 10^24.
    #[schemars(with = "String")]
    pub reward_rate: U128,
    #[schemars(with = "String")]
    pub min_stake_amount: U128,
    #[schemars(with = "String")]
    pub max_stake_amount: U128,
}

#[near(contract_state)]
#[derive(PanicOnDefault)]
pub struct StakeLedger {
    owner_id: AccountId,
    default_asset: AccountId,
    reward_rate: u128, // Reward per staked unit per second, scaled by RATE_DENOMINATOR
    min_stake_amount: u128,
    max_stake_amount: u128,
    stakes: LookupMap<RecordKey, StakeRecord>,
    participant_assets: LookupMap<AccountId, Vec<AccountId>>,
    assets: UnorderedMap<AccountId, AssetPool>,
    in_flight: LookupSet<RecordKey>,
}

#[near]
impl StakeLedger {
    #[init]
    pub fn new(
        default_asset: AccountId,
        reward_rate: U128,
        min_stake_amount: U128,
        max_stake_amount: U128,
    ) -> Self {
        require!(reward_rate.0 > 0, "Reward rate must be positive");
        require!(min_stake_amount.0 > 0, "Minimum stake amount must be positive");
        require!(
            min_stake_amount.0 <= max_stake_amount.0,
            "Minimum stake amount cannot exceed maximum"
        );

        let mut this = Self {
            owner_id: env::predecessor_account_id(),
            default_asset: default_asset.clone(),
            reward_rate: reward_rate.0,
            min_stake_amount: min_stake_amount.0,
            max_stake_amount: max_stake_amount.0,
            stakes: LookupMap::new(StorageKey::Stakes),
            participant_assets: LookupMap::new(StorageKey::ParticipantAssets),
            assets: UnorderedMap::new(StorageKey::Assets),
            in_flight: LookupSet::new(StorageKey::InFlight),
        };
        this.internal_register_asset(default_asset);
        this
    }

    // ========================================
    // Participant operations
    // ========================================

    /// Pulls `amount` of `asset` from the caller through the allowance the
    /// caller granted the ledger, then records the stake. Reward accrued on an
    /// earlier stake is paid out from the reward pool and the accrual window
    /// restarts, so `calculate_reward` reads 0 right after the commit.
    pub fn stake(&mut self, amount: U128, asset: AccountId) -> Promise {
        let participant = env::predecessor_account_id();
        self.internal_begin_stake(&participant, &asset, amount.0, env::block_timestamp())
            .unwrap_or_else(|err| err.panic());

        ext_asset::ext(asset.clone())
            .with_attached_deposit(ONE_YOCTO)
            .with_static_gas(GAS_FOR_FT_TRANSFER)
            .ft_transfer_from(participant.clone(), env::current_account_id(), amount, None)
            .then(
                Self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_RESOLVE_STAKE)
                    .on_stake_transferred(participant, asset, amount),
            )
    }

    /// Pays everything accrued for `participant` on `asset` and restarts the
    /// accrual window. Only the participant may trigger the payout.
    pub fn withdraw_reward(&mut self, participant: AccountId, asset: Option<AccountId>) -> Promise {
        let asset = self.asset_or_default(asset);
        let now = env::block_timestamp();
        let reward = self
            .internal_begin_reward_withdrawal(&env::predecessor_account_id(), &participant, &asset, now)
            .unwrap_or_else(|err| err.panic());

        ext_asset::ext(asset.clone())
            .with_attached_deposit(ONE_YOCTO)
            .with_static_gas(GAS_FOR_FT_TRANSFER)
            .ft_transfer(participant.clone(), U128(reward), None)
            .then(
                Self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_RESOLVE)
                    .on_reward_transferred(participant, asset, U128(reward), now),
            )
    }

    /// Returns `amount` of staked principal to the caller. Reward accrued so
    /// far is kept and keeps accruing on the remaining balance. The record's
    /// `last_accrual_at` moves to the commit time because the earned part is
    /// carried in `settled_reward`.
    pub fn withdraw_staked_token(&mut self, amount: U128, asset: AccountId) -> Promise {
        let participant = env::predecessor_account_id();
        self.internal_begin_principal_withdrawal(&participant, &asset, amount.0)
            .unwrap_or_else(|err| err.panic());

        ext_asset::ext(asset.clone())
            .with_attached_deposit(ONE_YOCTO)
            .with_static_gas(GAS_FOR_FT_TRANSFER)
            .ft_transfer(participant.clone(), amount, None)
            .then(
                Self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_RESOLVE)
                    .on_principal_transferred(participant, asset, amount),
            )
    }

    // ========================================
    // Transfer resolution callbacks
    // ========================================

    #[private]
    pub fn on_stake_transferred(&mut self, participant: AccountId, asset: AccountId, amount: U128) -> U128 {
        U128(self.resolve_stake(participant, asset, amount.0, is_promise_success(), env::block_timestamp()))
    }

    #[private]
    pub fn on_reward_transferred(
        &mut self,
        participant: AccountId,
        asset: AccountId,
        amount: U128,
        accrued_until: u64,
    ) -> U128 {
        U128(self.resolve_reward_withdrawal(participant, asset, amount.0, accrued_until, is_promise_success()))
    }

    #[private]
    pub fn on_settled_reward_transferred(&mut self, participant: AccountId, asset: AccountId, amount: U128) -> U128 {
        U128(self.resolve_settled_reward(participant, asset, amount.0, is_promise_success()))
    }

    #[private]
    pub fn on_principal_transferred(&mut self, participant: AccountId, asset: AccountId, amount: U128) -> U128 {
        U128(self.resolve_principal_withdrawal(
            participant,
            asset,
            amount.0,
            is_promise_success(),
            env::block_timestamp(),
        ))
    }

    // ========================================
    // Views
    // ========================================

    #[handle_result]
    pub fn calculate_reward(&self, participant: AccountId, asset: Option<AccountId>) -> Result<U128, StakingError> {
        let asset = self.asset_or_default(asset);
        match self.stakes.get(&(participant, asset)) {
            Some(record) => record
                .pending_reward(self.reward_rate, env::block_timestamp())
                .map(U128),
            None => Ok(U128(0)),
        }
    }

    /// Stake record of `participant` on `asset` (default asset when omitted).
    /// A participant who never staked gets an all-zero record.
    pub fn userstake_info(&self, participant: AccountId, asset: Option<AccountId>) -> StakeRecordView {
        let asset = self.asset_or_default(asset);
        let record = self
            .stakes
            .get(&(participant.clone(), asset.clone()))
            .unwrap_or_default();
        StakeRecordView::from_parts(participant, asset, record)
    }

    pub fn get_participant_stakes(&self, participant: AccountId) -> Vec<StakeRecordView> {
        let Some(assets) = self.participant_assets.get(&participant) else {
            return vec![];
        };
        assets
            .into_iter()
            .filter_map(|asset| {
                self.stakes
                    .get(&(participant.clone(), asset.clone()))
                    .map(|record| StakeRecordView::from_parts(participant.clone(), asset, record))
            })
            .collect()
    }

    pub fn get_asset_pool(&self, asset: AccountId) -> Option<AssetPoolView> {
        self.assets
            .get(&asset)
            .map(|pool| AssetPoolView::from_parts(asset, pool))
    }

    pub fn list_assets(&self) -> Vec<AssetPoolView> {
        self.assets
            .iter()
            .map(|(asset, pool)| AssetPoolView::from_parts(asset, pool))
            .collect()
    }

    pub fn get_config(&self) -> ConfigView {
        ConfigView {
            owner_id: self.owner_id.clone(),
            default_asset: self.default_asset.clone(),
            reward_rate: U128(self.reward_rate),
            min_stake_amount: U128(self.min_stake_amount),
            max_stake_amount: U128(self.max_stake_amount),
        }
    }

    pub fn is_operation_pending(&self, participant: AccountId, asset: AccountId) -> bool {
        self.in_flight.contains(&(participant, asset))
    }

    // ========================================
    // Owner functions
    // ========================================

    fn assert_owner(&self) {
        require!(
            env::predecessor_account_id() == self.owner_id,
            "Only the owner can call this method"
        );
    }

    pub fn register_asset(&mut self, asset: AccountId) {
        self.assert_owner();
        require!(self.assets.get(&asset).is_none(), "Asset already registered");
        self.internal_register_asset(asset);
    }

    /// Disabling an asset blocks new stakes; withdrawals stay open.
    pub fn set_asset_enabled(&mut self, asset: AccountId, enabled: bool) {
        self.assert_owner();
        let mut pool = self.pool(&asset).unwrap_or_else(|err| err.panic());
        pool.is_enabled = enabled;
        self.assets.insert(&asset, &pool);
        env::log_str(&format!("ASSET_UPDATED: {} enabled={}", asset, enabled));
    }

    /// Applies to every open accrual window, including time already elapsed.
    pub fn update_reward_rate(&mut self, new_rate: U128) {
        self.assert_owner();
        require!(new_rate.0 > 0, "Reward rate must be positive");
        let old_rate = self.reward_rate;
        self.reward_rate = new_rate.0;
        StakingEvent::RewardRateUpdated {
            old_rate: U128(old_rate),
            new_rate,
        }
        .emit();
    }

    pub fn update_stake_limits(&mut self, min_stake_amount: U128, max_stake_amount: U128) {
        self.assert_owner();
        require!(min_stake_amount.0 > 0, "Minimum stake amount must be positive");
        require!(
            min_stake_amount.0 <= max_stake_amount.0,
            "Minimum stake amount cannot exceed maximum"
        );
        self.min_stake_amount = min_stake_amount.0;
        self.max_stake_amount = max_stake_amount.0;
        env::log_str(&format!(
            "STAKE_LIMITS_UPDATED: min {} max {}",
            min_stake_amount.0, max_stake_amount.0
        ));
    }

    pub fn set_owner(&mut self, new_owner: AccountId) {
        self.assert_owner();
        env::log_str(&format!("OWNER_CHANGED: {} -> {}", self.owner_id, new_owner));
        self.owner_id = new_owner;
    }
}

#[near]
impl FungibleTokenReceiver for StakeLedger {
    /// Push path for registered assets: `{"action":"stake"}` stakes the
    /// transferred amount for `sender_id`, `{"action":"fund_rewards"}` tops up
    /// the asset's reward pool. Any failure panics so the token refunds.
    fn ft_on_transfer(&mut self, sender_id: AccountId, amount: U128, msg: String) -> PromiseOrValue<U128> {
        let asset = env::predecessor_account_id();
        let action: TransferAction =
            serde_json::from_str(&msg).unwrap_or_else(|_| env::panic_str("Invalid transfer message payload"));

        match action {
            TransferAction::Stake => {
                let now = env::block_timestamp();
                let owed = self
                    .internal_validate_stake(&sender_id, &asset, amount.0, now)
                    .and_then(|_| self.internal_commit_stake(&sender_id, &asset, amount.0, now))
                    .unwrap_or_else(|err| err.panic());
                if owed > 0 {
                    self.internal_pay_settled_reward(&sender_id, &asset, owed);
                }
            }
            TransferAction::FundRewards => self
                .internal_fund_rewards(&sender_id, &asset, amount.0)
                .unwrap_or_else(|err| err.panic()),
        }

        PromiseOrValue::Value(U128(0))
    }
}

fn is_promise_success() -> bool {
    require!(env::promise_results_count() == 1, "Expected exactly one promise result");
    matches!(env::promise_result(0), PromiseResult::Successful(_))
}

impl StakeLedger {
    fn asset_or_default(&self, asset: Option<AccountId>) -> AccountId {
        asset.unwrap_or_else(|| self.default_asset.clone())
    }

    fn internal_register_asset(&mut self, asset: AccountId) {
        self.assets.insert(&asset, &AssetPool::new(env::block_timestamp()));
        StakingEvent::AssetRegistered { asset }.emit();
    }

    fn lock(&mut self, key: &RecordKey) -> Result<(), StakingError> {
        if !self.in_flight.insert(key) {
            return Err(StakingError::OperationInProgress);
        }
        Ok(())
    }

    fn unlock(&mut self, key: &RecordKey) {
        self.in_flight.remove(key);
    }

    fn pool(&self, asset: &AccountId) -> Result<AssetPool, StakingError> {
        self.assets.get(asset).ok_or(StakingError::UnsupportedAsset)
    }

    fn internal_validate_stake(
        &self,
        participant: &AccountId,
        asset: &AccountId,
        amount: u128,
        now: u64,
    ) -> Result<(), StakingError> {
        let pool = self.pool(asset)?;
        if !pool.is_enabled {
            return Err(StakingError::AssetDisabled);
        }
        if amount == 0 || amount < self.min_stake_amount {
            return Err(StakingError::InvalidAmount);
        }
        let key = (participant.clone(), asset.clone());
        if self.in_flight.contains(&key) {
            return Err(StakingError::OperationInProgress);
        }
        let existing = self.stakes.get(&key);
        let current = existing.as_ref().map(|r| r.amount_staked).unwrap_or(0);
        let new_total = current
            .checked_add(amount)
            .ok_or(StakingError::StakeLimitExceeded)?;
        if new_total > self.max_stake_amount {
            return Err(StakingError::StakeLimitExceeded);
        }
        // A restake pays out what is owed; refuse early if the pool cannot.
        if let Some(record) = existing {
            if record.pending_reward(self.reward_rate, now)? > pool.reward_pool {
                return Err(StakingError::InsufficientRewardPool);
            }
        }
        Ok(())
    }

    fn internal_begin_stake(
        &mut self,
        participant: &AccountId,
        asset: &AccountId,
        amount: u128,
        now: u64,
    ) -> Result<(), StakingError> {
        self.internal_validate_stake(participant, asset, amount, now)?;
        self.lock(&(participant.clone(), asset.clone()))
    }

    /// Records `amount` as staked at `now`; tokens must already be held.
    /// Returns the reward owed on the earlier stake, already reserved from the
    /// pool and settled on the record.
    fn internal_commit_stake(
        &mut self,
        participant: &AccountId,
        asset: &AccountId,
        amount: u128,
        now: u64,
    ) -> Result<u128, StakingError> {
        let key = (participant.clone(), asset.clone());
        let mut pool = self.pool(asset)?;
        let existing = self.stakes.get(&key);
        let is_new = existing.is_none();
        let mut record = existing.unwrap_or_else(|| StakeRecord::new(now));
        let owed = record.credit(amount, self.reward_rate, now)?;
        pool.reward_pool = pool
            .reward_pool
            .checked_sub(owed)
            .ok_or(StakingError::InsufficientRewardPool)?;
        pool.total_staked = pool
            .total_staked
            .checked_add(amount)
            .ok_or(StakingError::StakeLimitExceeded)?;

        self.stakes.insert(&key, &record);
        self.assets.insert(asset, &pool);
        if is_new {
            let mut assets = self.participant_assets.get(participant).unwrap_or_default();
            assets.push(asset.clone());
            self.participant_assets.insert(participant, &assets);
        }

        env::log_str(&format!("STAKE: Account {} staked {} of {}", participant, amount, asset));
        StakingEvent::Staked {
            participant: participant.clone(),
            asset: asset.clone(),
            amount: U128(amount),
            timestamp: record.last_accrual_at,
        }
        .emit();
        Ok(owed)
    }

    /// Sends reward settled by a restake. The record stays locked until the
    /// transfer resolves.
    fn internal_pay_settled_reward(&mut self, participant: &AccountId, asset: &AccountId, reward: u128) {
        self.in_flight.insert(&(participant.clone(), asset.clone()));
        ext_asset::ext(asset.clone())
            .with_attached_deposit(ONE_YOCTO)
            .with_static_gas(GAS_FOR_FT_TRANSFER)
            .ft_transfer(participant.clone(), U128(reward), None)
            .then(
                Self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_RESOLVE)
                    .on_settled_reward_transferred(participant.clone(), asset.clone(), U128(reward)),
            );
    }

    fn resolve_settled_reward(
        &mut self,
        participant: AccountId,
        asset: AccountId,
        reward: u128,
        transfer_succeeded: bool,
    ) -> u128 {
        let key = (participant.clone(), asset.clone());
        self.unlock(&key);

        if !transfer_succeeded {
            // Hand the reward back to the record so it can be withdrawn later.
            if let Some(mut record) = self.stakes.get(&key) {
                record.settled_reward = record.settled_reward.saturating_add(reward);
                self.stakes.insert(&key, &record);
            }
            if let Some(mut pool) = self.assets.get(&asset) {
                pool.reward_pool = pool.reward_pool.saturating_add(reward);
                self.assets.insert(&asset, &pool);
            }
            env::log_str(&format!(
                "REWARD_FAILED: {:?} paying {} of {} to {}",
                StakingError::AssetTransferFailed,
                reward,
                asset,
                participant
            ));
            return 0;
        }

        env::log_str(&format!("REWARD: Account {} claimed {} of {}", participant, reward, asset));
        StakingEvent::WithdrawRewardToken {
            participant,
            asset,
            amount: U128(reward),
        }
        .emit();
        reward
    }

    fn resolve_stake(
        &mut self,
        participant: AccountId,
        asset: AccountId,
        amount: u128,
        transfer_succeeded: bool,
        now: u64,
    ) -> u128 {
        self.unlock(&(participant.clone(), asset.clone()));
        if !transfer_succeeded {
            env::log_str(&format!(
                "STAKE_FAILED: {:?} pulling {} of {} from {}",
                StakingError::AssetTransferFailed,
                amount,
                asset,
                participant
            ));
            return 0;
        }
        match self.internal_commit_stake(&participant, &asset, amount, now) {
            Ok(owed) => {
                if owed > 0 {
                    self.internal_pay_settled_reward(&participant, &asset, owed);
                }
                amount
            }
            Err(err) => {
                // Tokens already arrived; send them back.
                env::log_str(&format!("STAKE_REFUNDED: {:?} for {}", err, participant));
                ext_asset::ext(asset)
                    .with_attached_deposit(ONE_YOCTO)
                    .with_static_gas(GAS_FOR_FT_TRANSFER)
                    .ft_transfer(participant, U128(amount), None);
                0
            }
        }
    }

    fn internal_begin_reward_withdrawal(
        &mut self,
        caller: &AccountId,
        participant: &AccountId,
        asset: &AccountId,
        now: u64,
    ) -> Result<u128, StakingError> {
        if caller != participant {
            return Err(StakingError::Unauthorized);
        }
        let mut pool = self.pool(asset)?;
        let key = (participant.clone(), asset.clone());
        if self.in_flight.contains(&key) {
            return Err(StakingError::OperationInProgress);
        }
        let record = self.stakes.get(&key).ok_or(StakingError::NoStakeFound)?;
        let reward = record.pending_reward(self.reward_rate, now)?;
        if reward == 0 {
            return Err(StakingError::NoRewardToWithdraw);
        }
        if pool.reward_pool < reward {
            return Err(StakingError::InsufficientRewardPool);
        }

        // Reserve the payout so concurrent withdrawals cannot overdraw the pool.
        pool.reward_pool -= reward;
        self.assets.insert(asset, &pool);
        self.lock(&key)?;
        Ok(reward)
    }

    fn resolve_reward_withdrawal(
        &mut self,
        participant: AccountId,
        asset: AccountId,
        reward: u128,
        accrued_until: u64,
        transfer_succeeded: bool,
    ) -> u128 {
        let key = (participant.clone(), asset.clone());
        self.unlock(&key);

        if !transfer_succeeded {
            if let Some(mut pool) = self.assets.get(&asset) {
                pool.reward_pool = pool.reward_pool.saturating_add(reward);
                self.assets.insert(&asset, &pool);
            }
            env::log_str(&format!(
                "REWARD_FAILED: {:?} paying {} of {} to {}",
                StakingError::AssetTransferFailed,
                reward,
                asset,
                participant
            ));
            return 0;
        }

        if let Some(mut record) = self.stakes.get(&key) {
            record.settle_payout(accrued_until);
            self.stakes.insert(&key, &record);
        }
        env::log_str(&format!("REWARD: Account {} claimed {} of {}", participant, reward, asset));
        StakingEvent::WithdrawRewardToken {
            participant,
            asset,
            amount: U128(reward),
        }
        .emit();
        reward
    }

    fn internal_begin_principal_withdrawal(
        &mut self,
        participant: &AccountId,
        asset: &AccountId,
        amount: u128,
    ) -> Result<(), StakingError> {
        self.pool(asset)?;
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let key = (participant.clone(), asset.clone());
        if self.in_flight.contains(&key) {
            return Err(StakingError::OperationInProgress);
        }
        let record = self.stakes.get(&key).ok_or(StakingError::NoStakeFound)?;
        if amount > record.amount_staked {
            return Err(StakingError::InsufficientStakedBalance);
        }
        self.lock(&key)
    }

    fn resolve_principal_withdrawal(
        &mut self,
        participant: AccountId,
        asset: AccountId,
        amount: u128,
        transfer_succeeded: bool,
        now: u64,
    ) -> u128 {
        let key = (participant.clone(), asset.clone());
        self.unlock(&key);

        if !transfer_succeeded {
            env::log_str(&format!(
                "UNSTAKE_FAILED: {:?} returning {} of {} to {}",
                StakingError::AssetTransferFailed,
                amount,
                asset,
                participant
            ));
            return 0;
        }

        // The record was locked since validation, so the debit cannot fail.
        let mut record = self.stakes.get(&key).unwrap_or_default();
        if let Err(err) = record.debit(amount, self.reward_rate, now) {
            env::log_str(&format!("UNSTAKE_INCONSISTENT: {:?} for {}", err, participant));
            return 0;
        }
        self.stakes.insert(&key, &record);
        if let Some(mut pool) = self.assets.get(&asset) {
            pool.total_staked = pool.total_staked.saturating_sub(amount);
            self.assets.insert(&asset, &pool);
        }

        env::log_str(&format!("UNSTAKE: Account {} withdrew {} of {}", participant, amount, asset));
        StakingEvent::WithdrawStakedToken {
            participant,
            asset,
            amount: U128(amount),
        }
        .emit();
        amount
    }

    fn internal_fund_rewards(
        &mut self,
        funder: &AccountId,
        asset: &AccountId,
        amount: u128,
    ) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let mut pool = self.pool(asset)?;
        pool.reward_pool = pool
            .reward_pool
            .checked_add(amount)
            .ok_or(StakingError::RewardOverflow)?;
        self.assets.insert(asset, &pool);

        StakingEvent::RewardsFunded {
            funder: funder.clone(),
            asset: asset.clone(),
            amount: U128(amount),
        }
        .emit();
        Ok(())
    }
}
