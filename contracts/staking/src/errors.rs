use near_sdk::{env, FunctionError};

/// Failures surfaced by ledger operations.
///
/// A public method that hits one of these panics the receipt with
/// `StakingError: <Variant>`, which reverts every state change made so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakingError {
    /// Zero amount, or a stake below the configured minimum.
    InvalidAmount,
    /// Principal withdrawal larger than the staked balance.
    InsufficientStakedBalance,
    NoStakeFound,
    NoRewardToWithdraw,
    /// The asset's reward pool cannot cover the payout.
    InsufficientRewardPool,
    UnsupportedAsset,
    AssetDisabled,
    /// Resulting stake would exceed the configured maximum.
    StakeLimitExceeded,
    /// Another operation on the same (participant, asset) record is waiting
    /// for its asset transfer to resolve.
    OperationInProgress,
    Unauthorized,
    RewardOverflow,
    /// The asset contract rejected the transfer (allowance or balance).
    AssetTransferFailed,
}

impl FunctionError for StakingError {
    fn panic(&self) -> ! {
        env::panic_str(&format!("StakingError: {:?}", self))
    }
}
