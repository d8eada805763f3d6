//! Allowance extension on top of NEP-141: an owner lets a spender move part of
//! the owner's balance, so contracts can pull deposits instead of waiting for
//! a push.

use near_sdk::json_types::U128;
use near_sdk::{assert_one_yocto, env, near, require, AccountId};

use crate::errors::TokenError;
use crate::{StakeToken, StakeTokenExt};

#[near(event_json(standard = "stake_token"))]
pub enum TokenEvent {
    #[event_version("1.0.0")]
    FtApproval {
        owner_id: AccountId,
        spender_id: AccountId,
        amount: U128,
    },
}

#[near]
impl StakeToken {
    /// Sets the allowance of `spender_id` over the caller's balance,
    /// replacing any previous value. Zero revokes it.
    #[payable]
    pub fn ft_approve(&mut self, spender_id: AccountId, amount: U128) {
        assert_one_yocto();
        let owner_id = env::predecessor_account_id();
        require!(owner_id != spender_id, "Cannot approve yourself");

        let key = (owner_id.clone(), spender_id.clone());
        if amount.0 == 0 {
            self.allowances.remove(&key);
        } else {
            self.allowances.insert(&key, &amount.0);
        }

        TokenEvent::FtApproval {
            owner_id,
            spender_id,
            amount,
        }
        .emit();
    }

    pub fn ft_allowance(&self, owner_id: AccountId, spender_id: AccountId) -> U128 {
        U128(self.allowances.get(&(owner_id, spender_id)).unwrap_or(0))
    }

    /// Moves `amount` from `owner_id` to `receiver_id` on behalf of the caller
    /// and returns the allowance left.
    #[payable]
    #[handle_result]
    pub fn ft_transfer_from(
        &mut self,
        owner_id: AccountId,
        receiver_id: AccountId,
        amount: U128,
        memo: Option<String>,
    ) -> Result<U128, TokenError> {
        assert_one_yocto();
        let spender_id = env::predecessor_account_id();
        let remaining = self.internal_spend_allowance(&owner_id, &spender_id, amount.0)?;
        self.token.internal_transfer(&owner_id, &receiver_id, amount.0, memo);
        Ok(U128(remaining))
    }
}

impl StakeToken {
    fn internal_spend_allowance(
        &mut self,
        owner_id: &AccountId,
        spender_id: &AccountId,
        amount: u128,
    ) -> Result<u128, TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }
        let key = (owner_id.clone(), spender_id.clone());
        let allowance = self.allowances.get(&key).unwrap_or(0);
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance);
        }
        let balance = self.token.accounts.get(owner_id).unwrap_or(0);
        if balance < amount {
            return Err(TokenError::InsufficientBalance);
        }

        let remaining = allowance - amount;
        if remaining == 0 {
            self.allowances.remove(&key);
        } else {
            self.allowances.insert(&key, &remaining);
        }
        Ok(remaining)
    }
}
