use near_sdk::json_types::U128;
use near_sdk::{ext_contract, AccountId};

/// Asset-side calls the ledger makes. Any NEP-141 token exposing the
/// allowance extension (`ft_transfer_from`) can back a stake.
#[ext_contract(ext_asset)]
pub trait TransferableAsset {
    fn ft_transfer(&mut self, receiver_id: AccountId, amount: U128, memo: Option<String>);
    fn ft_transfer_from(
        &mut self,
        owner_id: AccountId,
        receiver_id: AccountId,
        amount: U128,
        memo: Option<String>,
    ) -> U128;
}
