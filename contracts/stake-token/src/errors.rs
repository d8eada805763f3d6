use near_sdk::{env, FunctionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Spender's allowance does not cover the transfer.
    InsufficientAllowance,
    InsufficientBalance,
    InvalidAmount,
}

impl FunctionError for TokenError {
    fn panic(&self) -> ! {
        env::panic_str(&format!("TokenError: {:?}", self))
    }
}
