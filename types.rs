use std::fmt;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::errors::{ExchangeError, ExchangeResult};

/// Ledger amount. Token units, LP shares and native currency all share it.
pub type Amount = u128;

// ─── Token constants ──────────────────────────────────────────────────────────

pub const TOKEN_NAME: &str = "NewCoin";
pub const TOKEN_SYMBOL: &str = "NEW";

/// Percentage of every taxed transfer routed to the treasury.
pub const TAX_PERCENTAGE: Amount = 5;

/// Fixed supply minted by `initialize`.
pub const TOTAL_SUPPLY: Amount = 500_000;
/// Share of the supply credited to the initializing receiver.
pub const RECEIVER_ALLOCATION: Amount = 150_000;
/// Remainder credited to the treasury.
pub const TREASURY_ALLOCATION: Amount = TOTAL_SUPPLY - RECEIVER_ALLOCATION;

// ─── Pool constants ───────────────────────────────────────────────────────────

/// Swap fee numerator kept by the pool (1% = 100 - 99).
pub const FEE_NUMERATOR: u64 = 99;
pub const FEE_DENOMINATOR: u64 = 100;

/// Allowance value that is never decremented by `transfer_from`.
pub const UNLIMITED_ALLOWANCE: Amount = Amount::MAX;

// ─── Addresses ────────────────────────────────────────────────────────────────

/// Opaque account identifier. Contracts and people live in the same space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub u64);

impl Address {
    pub const ZERO: Address = Address(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:040x}", self.0)
    }
}

impl From<u64> for Address {
    fn from(raw: u64) -> Self {
        Address(raw)
    }
}

// ─── Transfer receipt ─────────────────────────────────────────────────────────

/// What a token movement actually did.
///
/// `gross` left the sender, `net` reached the recipient and `tax` went to the
/// treasury. `gross == net + tax` always holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub gross: Amount,
    pub net: Amount,
    pub tax: Amount,
}

impl TransferReceipt {
    pub fn untaxed(amount: Amount) -> Self {
        Self { gross: amount, net: amount, tax: 0 }
    }

    /// Split `amount` into the net leg and the tax leg.
    /// net = floor(amount * (100 - TAX_PERCENTAGE) / 100)
    pub fn taxed(amount: Amount) -> Self {
        let keep = 100 - TAX_PERCENTAGE;
        let net = amount / 100 * keep + amount % 100 * keep / 100;
        Self { gross: amount, net, tax: amount - net }
    }
}

// ─── Wide arithmetic ──────────────────────────────────────────────────────────

/// floor(a * b / denominator) evaluated and returned in 256 bits.
#[inline]
pub fn mul_div_wide(a: Amount, b: Amount, denominator: Amount) -> U256 {
    debug_assert!(denominator != 0);
    U256::from(a) * U256::from(b) / U256::from(denominator)
}

/// floor(a * b / denominator), failing if the quotient does not fit `Amount`.
#[inline]
pub fn mul_div(a: Amount, b: Amount, denominator: Amount) -> ExchangeResult<Amount> {
    narrow(mul_div_wide(a, b, denominator))
}

/// Checked narrowing from 256 bits back to `Amount`.
#[inline]
pub fn narrow(value: U256) -> ExchangeResult<Amount> {
    if value > U256::from(Amount::MAX) {
        return Err(ExchangeError::ArithmeticOverflow);
    }
    Ok(value.low_u128())
}

/// floor(sqrt(a * b)) evaluated in 256 bits.
#[inline]
pub fn sqrt_product(a: Amount, b: Amount) -> Amount {
    (U256::from(a) * U256::from(b)).integer_sqrt().low_u128()
}

/// Overflow-checked addition for balances.
#[inline]
pub fn checked_credit(balance: Amount, amount: Amount) -> ExchangeResult<Amount> {
    balance.checked_add(amount).ok_or(ExchangeError::ArithmeticOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxed_receipt_floors_net_leg() {
        let r = TransferReceipt::taxed(100);
        assert_eq!((r.net, r.tax), (95, 5));

        let r = TransferReceipt::taxed(19);
        assert_eq!(r.net, 18); // floor(18.05)
        assert_eq!(r.tax, 1);
        assert_eq!(r.net + r.tax, r.gross);
    }

    #[test]
    fn wide_math_survives_u128_products() {
        let big = Amount::MAX / 2;
        assert_eq!(mul_div(big, 4, 4), Ok(big));
        assert_eq!(sqrt_product(big, big), big);
        assert_eq!(sqrt_product(30_000, 150_000), 67_082);
    }

    #[test]
    fn oversized_quotient_is_an_error_not_a_wrap() {
        assert_eq!(mul_div(1 << 121, 512, 1), Err(ExchangeError::ArithmeticOverflow));
        assert_eq!(mul_div_wide(1 << 121, 512, 1), U256::from(1u128 << 121) * U256::from(512u64));
        assert_eq!(narrow(U256::from(Amount::MAX)), Ok(Amount::MAX));
    }

    #[test]
    fn taxed_receipt_is_exact_near_the_top_of_the_range() {
        let r = TransferReceipt::taxed(Amount::MAX);
        assert_eq!(r.net + r.tax, Amount::MAX);
        assert_eq!(U256::from(r.net), U256::from(Amount::MAX) * U256::from(95u64) / U256::from(100u64));
    }

    #[test]
    fn credit_overflow_is_an_error() {
        assert_eq!(checked_credit(Amount::MAX, 1), Err(ExchangeError::ArithmeticOverflow));
        assert_eq!(checked_credit(1, 2), Ok(3));
    }
}
