use near_sdk::json_types::U128;
use near_sdk::{near, AccountId};

/// NEP-297 events, logged in the same receipt that commits the state change.
#[near(event_json(standard = "stake_ledger"))]
pub enum StakingEvent {
    #[event_version("1.0.0")]
    Staked {
        participant: AccountId,
        asset: AccountId,
        amount: U128,
        timestamp: u64,
    },
    #[event_version("1.0.0")]
    WithdrawRewardToken {
        participant: AccountId,
        asset: AccountId,
        amount: U128,
    },
    #[event_version("1.0.0")]
    WithdrawStakedToken {
        participant: AccountId,
        asset: AccountId,
        amount: U128,
    },
    #[event_version("1.0.0")]
    RewardsFunded {
        funder: AccountId,
        asset: AccountId,
        amount: U128,
    },
    #[event_version("1.0.0")]
    AssetRegistered { asset: AccountId },
    #[event_version("1.0.0")]
    RewardRateUpdated { old_rate: U128, new_rate: U128 },
}
