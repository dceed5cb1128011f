use primitive_types::{U256, U512};
use tracing::info;

use crate::errors::{ExchangeError, ExchangeResult, OutputAsset};
use crate::events::EventLog;
use crate::pool::{Ledgers, LiquidityPool};
use crate::types::{Address, Amount, FEE_DENOMINATOR, FEE_NUMERATOR};

/// Stateless front door to the pool. Delivers the caller's assets into the
/// pool, then invokes the matching settle step.
#[derive(Clone, Copy, Debug)]
pub struct Router {
    address: Address,
    token: Address,
    pool: Address,
}

impl Router {
    pub fn deploy(address: Address, token: Address, pool: Address) -> Self {
        Self { address, token, pool }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn pool(&self) -> Address {
        self.pool
    }

    /// Deposit `amount_token_desired` tokens (pulled via allowance) and
    /// `value_currency` native currency, minting shares to `to`.
    ///
    /// No ratio matching: the scarcer side sets the share count.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &self,
        caller: Address,
        amount_token_desired: Amount,
        to: Address,
        value_currency: Amount,
        pool: &mut LiquidityPool,
        ledgers: &mut Ledgers<'_>,
        events: &mut EventLog,
    ) -> ExchangeResult<Amount> {
        if amount_token_desired > 0 {
            ledgers.token.transfer_from(self.address, caller, self.pool, amount_token_desired, events)?;
        }
        ledgers.currency.transfer(caller, self.pool, value_currency)?;

        let liquidity = pool.mint(self.address, to, ledgers, events)?;
        info!(%caller, %to, amount_token_desired, value_currency, liquidity, "liquidity added");
        Ok(liquidity)
    }

    /// Return `liquidity` shares (pulled via allowance) and pay both assets
    /// out to `to`.
    pub fn remove_liquidity(
        &self,
        caller: Address,
        liquidity: Amount,
        to: Address,
        pool: &mut LiquidityPool,
        ledgers: &mut Ledgers<'_>,
        events: &mut EventLog,
    ) -> ExchangeResult<(Amount, Amount)> {
        if liquidity == 0 {
            return Err(ExchangeError::InsufficientBurnAmount);
        }
        pool.transfer_from(self.address, caller, self.pool, liquidity, events)?;

        let (amount_currency, amount_token) = pool.burn(self.address, to, ledgers, events)?;
        info!(%caller, %to, liquidity, amount_currency, amount_token, "liquidity removed");
        Ok((amount_currency, amount_token))
    }

    /// Swap exactly one input asset for the other. Returns the gross amount
    /// the pool sent out; a taxed token output reaches `to` reduced.
    #[allow(clippy::too_many_arguments)]
    pub fn swap(
        &self,
        caller: Address,
        amount_token_in: Amount,
        amount_out_min: Amount,
        to: Address,
        value_currency: Amount,
        pool: &mut LiquidityPool,
        ledgers: &mut Ledgers<'_>,
        events: &mut EventLog,
    ) -> ExchangeResult<Amount> {
        let (reserve_currency, reserve_token) = pool.get_reserves();

        let amount_out = match (amount_token_in, value_currency) {
            (0, 0) => return Err(ExchangeError::InsufficientInputAmount),
            (0, currency_in) => {
                let amount_out = get_amount_out(currency_in, reserve_currency, reserve_token)?;
                ensure_min(OutputAsset::Token, amount_out, amount_out_min)?;
                ledgers.currency.transfer(caller, self.pool, currency_in)?;
                pool.swap(self.address, 0, amount_out, to, ledgers, events)?;
                amount_out
            }
            (token_in, 0) => {
                // Quote on what the pool actually receives, not on what left the caller.
                let receipt = ledgers.token.transfer_from(self.address, caller, self.pool, token_in, events)?;
                let amount_out = get_amount_out(receipt.net, reserve_token, reserve_currency)?;
                ensure_min(OutputAsset::Currency, amount_out, amount_out_min)?;
                pool.swap(self.address, amount_out, 0, to, ledgers, events)?;
                amount_out
            }
            _ => return Err(ExchangeError::AmbiguousSwapInput),
        };

        info!(%caller, %to, amount_token_in, value_currency, amount_out, "swapped");
        Ok(amount_out)
    }
}

/// Constant-product quote with a flat 1% fee on the input:
///
/// out = (in * 99 * reserve_out) / (reserve_in * 100 + in * 99)
///
/// Multiplies before dividing, in 512 bits.
pub fn get_amount_out(amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> ExchangeResult<Amount> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(ExchangeError::InvalidReserves);
    }
    let amount_in_with_fee = U256::from(amount_in) * U256::from(FEE_NUMERATOR);
    let numerator = amount_in_with_fee.full_mul(U256::from(reserve_out));
    let denominator = U512::from(U256::from(reserve_in) * U256::from(FEE_DENOMINATOR) + amount_in_with_fee);
    // Strictly below reserve_out, so it narrows losslessly.
    Ok((numerator / denominator).low_u128())
}

fn ensure_min(asset: OutputAsset, quoted: Amount, minimum: Amount) -> ExchangeResult<()> {
    if quoted < minimum {
        return Err(ExchangeError::SlippageExceeded { asset, quoted, minimum });
    }
    Ok(())
}
