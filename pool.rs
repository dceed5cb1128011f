//! Constant-product liquidity pool between the native currency and the tax token.
//!
//! The pool never pulls assets in. Callers deliver first, then invoke
//! `mint`/`swap`, and the pool settles on the observed balance deltas, so a
//! tax skimmed in flight is never credited.

use primitive_types::U256;
use tracing::debug;

use crate::currency::CurrencyLedger;
use crate::errors::{ExchangeError, ExchangeResult};
use crate::events::{Event, EventLog};
use crate::shares::FungibleLedger;
use crate::token::TaxToken;
use crate::types::{mul_div, mul_div_wide, narrow, sqrt_product, Address, Amount, FEE_DENOMINATOR, FEE_NUMERATOR};

/// Mutable view of the two asset ledgers the pool settles against.
pub struct Ledgers<'a> {
    pub currency: &'a mut CurrencyLedger,
    pub token: &'a mut TaxToken,
}

#[derive(Clone, Debug)]
pub struct LiquidityPool {
    address: Address,
    token: Address,
    shares: FungibleLedger,
    reserve_currency: Amount,
    reserve_token: Amount,
}

impl LiquidityPool {
    pub fn deploy(address: Address, token: Address) -> Self {
        Self {
            address,
            token,
            shares: FungibleLedger::new(),
            reserve_currency: 0,
            reserve_token: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn token(&self) -> Address {
        self.token
    }

    /// Cached `(reserve_currency, reserve_token)` snapshot.
    pub fn get_reserves(&self) -> (Amount, Amount) {
        (self.reserve_currency, self.reserve_token)
    }

    pub fn shares(&self) -> &FungibleLedger {
        &self.shares
    }

    pub fn total_supply(&self) -> Amount {
        self.shares.total_supply()
    }

    pub fn balance_of(&self, account: Address) -> Amount {
        self.shares.balance_of(account)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.shares.allowance(owner, spender)
    }

    /// Actual `(currency, token)` held by the pool right now.
    pub fn live_balances(&self, ledgers: &Ledgers<'_>) -> (Amount, Amount) {
        (ledgers.currency.balance_of(self.address), ledgers.token.balance_of(self.address))
    }

    // ─── Reserve accounting ───────────────────────────────────────────────────

    /// Re-read both reserves from the live balances, e.g. after someone sent
    /// assets to the pool directly.
    pub fn sync(&mut self, ledgers: &Ledgers<'_>, events: &mut EventLog) {
        let (currency, token) = self.live_balances(ledgers);
        self.update_reserves(currency, token, events);
    }

    /// Mint liquidity for whatever the caller delivered since the last update.
    pub fn mint(
        &mut self,
        caller: Address,
        to: Address,
        ledgers: &mut Ledgers<'_>,
        events: &mut EventLog,
    ) -> ExchangeResult<Amount> {
        let (balance_currency, balance_token) = self.live_balances(ledgers);
        let (amount_currency, amount_token) = self.inbound(balance_currency, balance_token)?;
        let total_supply = self.shares.total_supply();

        let liquidity = if total_supply == 0 {
            let liquidity = sqrt_product(amount_currency, amount_token);
            if liquidity == 0 {
                return Err(ExchangeError::InsufficientInitialAmounts);
            }
            liquidity
        } else {
            if self.reserve_currency == 0 || self.reserve_token == 0 {
                return Err(ExchangeError::InvalidReserves);
            }
            // The scarcer side decides; any excess of the other side accrues to
            // existing holders.
            // Compared at full width: one side alone may not fit `Amount`.
            let liquidity = narrow(
                mul_div_wide(amount_currency, total_supply, self.reserve_currency)
                    .min(mul_div_wide(amount_token, total_supply, self.reserve_token)),
            )?;
            if liquidity == 0 {
                return Err(ExchangeError::InsufficientAmounts);
            }
            liquidity
        };

        self.shares.mint(to, liquidity)?;
        events.emit(Event::SharesTransferred { from: Address::ZERO, to, amount: liquidity });
        self.update_reserves(balance_currency, balance_token, events);
        events.emit(Event::LiquidityMinted { caller, to, amount_currency, amount_token });

        debug!(%caller, %to, amount_currency, amount_token, liquidity, "pool minted");
        Ok(liquidity)
    }

    /// Burn the shares the caller delivered to the pool and pay out the
    /// proportional slice of both live balances.
    pub fn burn(
        &mut self,
        caller: Address,
        to: Address,
        ledgers: &mut Ledgers<'_>,
        events: &mut EventLog,
    ) -> ExchangeResult<(Amount, Amount)> {
        let liquidity = self.shares.balance_of(self.address);
        if liquidity == 0 {
            return Err(ExchangeError::InsufficientBurnAmount);
        }

        let (balance_currency, balance_token) = self.live_balances(ledgers);
        let total_supply = self.shares.total_supply();
        let amount_currency = mul_div(liquidity, balance_currency, total_supply)?;
        let amount_token = mul_div(liquidity, balance_token, total_supply)?;

        self.shares.burn(self.address, liquidity)?;
        events.emit(Event::SharesTransferred { from: self.address, to: Address::ZERO, amount: liquidity });

        ledgers.currency.transfer(self.address, to, amount_currency)?;
        if amount_token > 0 {
            ledgers.token.transfer(self.address, to, amount_token, events)?;
        }

        let (balance_currency, balance_token) = self.live_balances(ledgers);
        self.update_reserves(balance_currency, balance_token, events);
        events.emit(Event::LiquidityBurned { caller, to, amount_currency, amount_token });

        debug!(%caller, %to, amount_currency, amount_token, liquidity, "pool burned");
        Ok((amount_currency, amount_token))
    }

    /// Pay out the requested amounts against inputs already delivered, and
    /// reject the trade unless the fee-adjusted product of balances did not
    /// shrink.
    pub fn swap(
        &mut self,
        caller: Address,
        amount_currency_out: Amount,
        amount_token_out: Amount,
        to: Address,
        ledgers: &mut Ledgers<'_>,
        events: &mut EventLog,
    ) -> ExchangeResult<()> {
        let (reserve_currency, reserve_token) = self.get_reserves();
        if amount_currency_out >= reserve_currency || amount_token_out >= reserve_token {
            return Err(ExchangeError::InsufficientLiquidity);
        }

        let (balance_currency, balance_token) = self.live_balances(ledgers);
        let (amount_currency_in, amount_token_in) = self.inbound(balance_currency, balance_token)?;
        if amount_currency_in == 0 && amount_token_in == 0 {
            return Err(ExchangeError::InsufficientInputAmount);
        }

        ledgers.currency.transfer(self.address, to, amount_currency_out)?;
        if amount_token_out > 0 {
            ledgers.token.transfer(self.address, to, amount_token_out, events)?;
        }

        let (balance_currency, balance_token) = self.live_balances(ledgers);
        check_constant_product(
            (balance_currency, balance_token),
            (amount_currency_in, amount_token_in),
            (reserve_currency, reserve_token),
        )?;

        self.update_reserves(balance_currency, balance_token, events);
        events.emit(Event::Swapped {
            caller,
            to,
            amount_currency_in,
            amount_token_in,
            amount_currency_out,
            amount_token_out,
        });

        debug!(
            %caller, %to,
            amount_currency_in, amount_token_in, amount_currency_out, amount_token_out,
            "pool swapped"
        );
        Ok(())
    }

    // ─── LP share transfers ───────────────────────────────────────────────────

    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount, events: &mut EventLog) {
        self.shares.approve(owner, spender, amount);
        events.emit(Event::SharesApproval { owner, spender, amount });
    }

    pub fn increase_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        added: Amount,
        events: &mut EventLog,
    ) -> ExchangeResult<Amount> {
        let amount = self.shares.increase_allowance(owner, spender, added)?;
        events.emit(Event::SharesApproval { owner, spender, amount });
        Ok(amount)
    }

    pub fn transfer(&mut self, caller: Address, to: Address, amount: Amount, events: &mut EventLog) -> ExchangeResult<()> {
        self.shares.move_balance(caller, to, amount)?;
        events.emit(Event::SharesTransferred { from: caller, to, amount });
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
        events: &mut EventLog,
    ) -> ExchangeResult<()> {
        self.shares.spend_allowance(owner, spender, amount)?;
        self.transfer(owner, to, amount, events)
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    /// Live balance minus cached reserve, per asset.
    fn inbound(&self, balance_currency: Amount, balance_token: Amount) -> ExchangeResult<(Amount, Amount)> {
        let currency = balance_currency.checked_sub(self.reserve_currency);
        let token = balance_token.checked_sub(self.reserve_token);
        match (currency, token) {
            (Some(c), Some(t)) => Ok((c, t)),
            _ => Err(ExchangeError::InvariantViolation(format!(
                "live balances ({balance_currency}, {balance_token}) below reserves ({}, {})",
                self.reserve_currency, self.reserve_token
            ))),
        }
    }

    fn update_reserves(&mut self, reserve_currency: Amount, reserve_token: Amount, events: &mut EventLog) {
        self.reserve_currency = reserve_currency;
        self.reserve_token = reserve_token;
        events.emit(Event::ReservesUpdated { reserve_currency, reserve_token });
    }
}

/// (b0*100 - in0*1) * (b1*100 - in1*1) >= r0 * r1 * 100^2
///
/// The 1% fee is charged on the inputs only, matching the router's quote.
fn check_constant_product(
    balances: (Amount, Amount),
    inputs: (Amount, Amount),
    reserves: (Amount, Amount),
) -> ExchangeResult<()> {
    let fee = U256::from(FEE_DENOMINATOR - FEE_NUMERATOR);
    let scale = U256::from(FEE_DENOMINATOR);

    let adjusted_currency = (U256::from(balances.0) * scale).saturating_sub(U256::from(inputs.0) * fee);
    let adjusted_token = (U256::from(balances.1) * scale).saturating_sub(U256::from(inputs.1) * fee);

    let after = adjusted_currency.full_mul(adjusted_token);
    let before = (U256::from(reserves.0) * U256::from(reserves.1)).full_mul(scale * scale);
    if after < before {
        return Err(ExchangeError::InvariantViolation(format!(
            "k decreased: balances {balances:?}, inputs {inputs:?}, reserves {reserves:?}"
        )));
    }
    Ok(())
}
