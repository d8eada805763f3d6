// Stakeable NEP-141 token: standard core, storage and metadata plus an
// allowance extension so staking contracts can pull deposits.

mod allowance;
mod errors;

pub use allowance::TokenEvent;
pub use errors::TokenError;

use near_contract_standards::fungible_token::core::FungibleTokenCore;
use near_contract_standards::fungible_token::events::{FtBurn, FtMint};
use near_contract_standards::fungible_token::metadata::{
    FungibleTokenMetadata, FungibleTokenMetadataProvider, FT_METADATA_SPEC,
};
use near_contract_standards::fungible_token::resolver::FungibleTokenResolver;
use near_contract_standards::fungible_token::FungibleToken;
use near_contract_standards::storage_management::{
    StorageBalance, StorageBalanceBounds, StorageManagement,
};
use near_sdk::borsh::{self, BorshSerialize};
use near_sdk::collections::LookupMap;
use near_sdk::json_types::U128;
use near_sdk::{
    env, near, require, AccountId, BorshStorageKey, NearToken, PanicOnDefault, PromiseOrValue,
};

const DECIMALS: u8 = 18;

#[derive(BorshStorageKey, BorshSerialize)]
enum StorageKey {
    FungibleToken,
    Allowances,
}

#[near(contract_state)]
#[derive(PanicOnDefault)]
pub struct StakeToken {
    token: FungibleToken,
    metadata: FungibleTokenMetadata,
    /// (owner, spender) -> amount the spender may still move
    allowances: LookupMap<(AccountId, AccountId), u128>,
    owner_id: AccountId,
}

#[near]
impl StakeToken {
    /// Mints `total_supply` to `owner_id`.
    #[init]
    pub fn new(owner_id: AccountId, total_supply: U128, name: String, symbol: String) -> Self {
        require!(!name.is_empty(), "Token name cannot be empty");
        require!(!symbol.is_empty(), "Token symbol cannot be empty");
        require!(total_supply.0 > 0, "Total supply must be greater than 0");

        let mut this = Self {
            token: FungibleToken::new(StorageKey::FungibleToken),
            metadata: FungibleTokenMetadata {
                spec: FT_METADATA_SPEC.to_string(),
                name,
                symbol,
                icon: None,
                reference: None,
                reference_hash: None,
                decimals: DECIMALS,
            },
            allowances: LookupMap::new(StorageKey::Allowances),
            owner_id: owner_id.clone(),
        };
        this.token.internal_register_account(&owner_id);
        this.token.internal_deposit(&owner_id, total_supply.0);

        FtMint {
            owner_id: &owner_id,
            amount: total_supply,
            memo: Some("Initial mint"),
        }
        .emit();
        this
    }

    pub fn get_owner(&self) -> AccountId {
        self.owner_id.clone()
    }
}

#[near]
impl FungibleTokenCore for StakeToken {
    #[payable]
    fn ft_transfer(&mut self, receiver_id: AccountId, amount: U128, memo: Option<String>) {
        self.token.ft_transfer(receiver_id, amount, memo)
    }

    #[payable]
    fn ft_transfer_call(
        &mut self,
        receiver_id: AccountId,
        amount: U128,
        memo: Option<String>,
        msg: String,
    ) -> PromiseOrValue<U128> {
        self.token.ft_transfer_call(receiver_id, amount, memo, msg)
    }

    fn ft_total_supply(&self) -> U128 {
        self.token.ft_total_supply()
    }

    fn ft_balance_of(&self, account_id: AccountId) -> U128 {
        self.token.ft_balance_of(account_id)
    }
}

#[near]
impl FungibleTokenResolver for StakeToken {
    #[private]
    fn ft_resolve_transfer(&mut self, sender_id: AccountId, receiver_id: AccountId, amount: U128) -> U128 {
        let (used_amount, burned_amount) =
            self.token.internal_ft_resolve_transfer(&sender_id, receiver_id, amount);
        if burned_amount > 0 {
            FtBurn {
                owner_id: &sender_id,
                amount: U128(burned_amount),
                memo: Some("Refund to closed account"),
            }
            .emit();
        }
        used_amount.into()
    }
}

#[near]
impl StorageManagement for StakeToken {
    #[payable]
    fn storage_deposit(&mut self, account_id: Option<AccountId>, registration_only: Option<bool>) -> StorageBalance {
        self.token.storage_deposit(account_id, registration_only)
    }

    #[payable]
    fn storage_withdraw(&mut self, amount: Option<NearToken>) -> StorageBalance {
        self.token.storage_withdraw(amount)
    }

    #[payable]
    fn storage_unregister(&mut self, force: Option<bool>) -> bool {
        match self.token.internal_storage_unregister(force) {
            Some((account_id, balance)) => {
                env::log_str(&format!("Closed @{} with {}", account_id, balance));
                true
            }
            None => false,
        }
    }

    fn storage_balance_bounds(&self) -> StorageBalanceBounds {
        self.token.storage_balance_bounds()
    }

    fn storage_balance_of(&self, account_id: AccountId) -> Option<StorageBalance> {
        self.token.storage_balance_of(account_id)
    }
}

#[near]
impl FungibleTokenMetadataProvider for StakeToken {
    fn ft_metadata(&self) -> FungibleTokenMetadata {
        self.metadata.clone()
    }
}
