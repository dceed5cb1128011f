use thiserror::Error;

use crate::types::{Address, Amount};

/// Which asset a slippage bound protected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputAsset {
    Currency,
    Token,
}

/// Every way an exchange operation can be rejected.
///
/// All variants are deterministic functions of ledger state and call
/// arguments. A rejected operation leaves the ledger untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("caller not the owner")]
    AccessDenied,
    #[error("already initialized")]
    AlreadyInitialized,
    #[error("tax unchanged")]
    NoOp,
    #[error("not allowed")]
    TransferNotAllowed,
    #[error("contract transfer not allowed")]
    SelfTransferDisallowed,

    #[error("insufficient initial amounts")]
    InsufficientInitialAmounts,
    #[error("insufficient amounts")]
    InsufficientAmounts,
    #[error("need to burn more liquidity")]
    InsufficientBurnAmount,
    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    #[error("invalid reserves")]
    InvalidReserves,
    #[error("insufficient input amount")]
    InsufficientInputAmount,
    #[error("swap takes either a token input or a currency input, not both")]
    AmbiguousSwapInput,
    #[error("{} min amount (quoted {quoted}, required {minimum})", asset_label(.asset))]
    SlippageExceeded { asset: OutputAsset, quoted: Amount, minimum: Amount },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("insufficient balance for {account}: needed {needed}, available {available}")]
    InsufficientBalance { account: Address, needed: Amount, available: Amount },
    #[error("insufficient allowance {owner} -> {spender}: needed {needed}, available {available}")]
    InsufficientAllowance { owner: Address, spender: Address, needed: Amount, available: Amount },
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

fn asset_label(asset: &OutputAsset) -> &'static str {
    match asset {
        OutputAsset::Token => "NEW",
        OutputAsset::Currency => "ETH",
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
