//! The whole ledger: native currency, token, pool and router behind one set of
//! entry points.
//!
//! Every mutating entry point runs against a working copy and only replaces
//! the live state when it returns `Ok`, so no partial transfer survives a
//! failed check further down the call.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::currency::CurrencyLedger;
use crate::errors::{ExchangeError, ExchangeResult};
use crate::events::{Event, EventLog};
use crate::pool::{Ledgers, LiquidityPool};
use crate::router::Router;
use crate::token::TaxToken;
use crate::types::{Address, Amount, TransferReceipt};

// ─── Deployment parameters ────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootstrapParams {
    /// Deploys everything and owns the token.
    pub deployer: Address,
    /// Receives the 150k allocation.
    pub receiver: Address,
    pub treasury: Address,
    /// Extra allow-list entries. Pool and router are always added.
    pub allow_list: Vec<Address>,
    pub token_address: Address,
    pub pool_address: Address,
    pub router_address: Address,
}

impl Default for BootstrapParams {
    fn default() -> Self {
        Self {
            deployer: Address(0x01),
            receiver: Address(0x01),
            treasury: Address(0x02),
            allow_list: vec![Address(0x01)],
            token_address: Address(0x1000),
            pool_address: Address(0x1001),
            router_address: Address(0x1002),
        }
    }
}

// ─── Ledger state ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct State {
    currency: CurrencyLedger,
    token: TaxToken,
    pool: LiquidityPool,
    router: Router,
}

/// Result of `Exchange::audit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub token_supply: Amount,
    pub lp_supply: Amount,
    pub currency_issued: Amount,
    pub reserves: (Amount, Amount),
    pub live_balances: (Amount, Amount),
}

pub struct Exchange {
    state: State,
    journal: Vec<Event>,
}

impl Exchange {
    /// Deploy token, pool and router without initializing anything.
    pub fn deploy(deployer: Address, token: Address, pool: Address, router: Address) -> Self {
        let state = State {
            currency: CurrencyLedger::new(),
            token: TaxToken::deploy(token, deployer),
            pool: LiquidityPool::deploy(pool, token),
            router: Router::deploy(router, token, pool),
        };
        Self { state, journal: Vec::new() }
    }

    /// Deploy, open transfers, then initialize the token with pool and router
    /// on the allow-list.
    pub fn bootstrap(params: &BootstrapParams) -> ExchangeResult<Self> {
        let mut exchange = Self::deploy(
            params.deployer,
            params.token_address,
            params.pool_address,
            params.router_address,
        );

        let mut allow_list = params.allow_list.clone();
        allow_list.extend([params.pool_address, params.router_address]);

        exchange.enable_transfers(params.deployer)?;
        exchange.initialize(params.deployer, params.receiver, params.treasury, &allow_list)?;
        info!(
            token = %params.token_address,
            pool = %params.pool_address,
            router = %params.router_address,
            "exchange bootstrapped"
        );
        Ok(exchange)
    }

    fn execute<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut State, &mut EventLog) -> ExchangeResult<T>,
    ) -> ExchangeResult<T> {
        let mut working = self.state.clone();
        let mut events = EventLog::new();
        match f(&mut working, &mut events) {
            Ok(value) => {
                self.state = working;
                self.journal.extend(events.into_events());
                Ok(value)
            }
            Err(err) => {
                warn!(operation, error = %err, "operation aborted");
                Err(err)
            }
        }
    }

    // ─── Views ────────────────────────────────────────────────────────────────

    pub fn token(&self) -> &TaxToken {
        &self.state.token
    }

    pub fn pool(&self) -> &LiquidityPool {
        &self.state.pool
    }

    pub fn router(&self) -> &Router {
        &self.state.router
    }

    pub fn currency(&self) -> &CurrencyLedger {
        &self.state.currency
    }

    pub fn currency_balance(&self, account: Address) -> Amount {
        self.state.currency.balance_of(account)
    }

    pub fn token_balance(&self, account: Address) -> Amount {
        self.state.token.balance_of(account)
    }

    pub fn lp_balance(&self, account: Address) -> Amount {
        self.state.pool.balance_of(account)
    }

    pub fn get_reserves(&self) -> (Amount, Amount) {
        self.state.pool.get_reserves()
    }

    /// Every event committed so far, in order.
    pub fn events(&self) -> &[Event] {
        &self.journal
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.journal)
    }

    /// Check the ledger-wide invariants that must hold between operations.
    pub fn audit(&self) -> ExchangeResult<AuditReport> {
        let s = &self.state;

        let token_sum = s.token.ledger().sum_of_balances()?;
        if token_sum != s.token.total_supply() {
            return Err(ExchangeError::InvariantViolation(format!(
                "token balances sum to {token_sum}, supply is {}",
                s.token.total_supply()
            )));
        }

        let lp_sum = s.pool.shares().sum_of_balances()?;
        if lp_sum != s.pool.total_supply() {
            return Err(ExchangeError::InvariantViolation(format!(
                "LP balances sum to {lp_sum}, supply is {}",
                s.pool.total_supply()
            )));
        }

        let currency_sum = s.currency.sum_of_balances()?;
        if currency_sum != s.currency.total_issued() {
            return Err(ExchangeError::InvariantViolation(format!(
                "currency balances sum to {currency_sum}, issued {}",
                s.currency.total_issued()
            )));
        }

        let reserves = s.pool.get_reserves();
        let pool = s.pool.address();
        let live_balances = (s.currency.balance_of(pool), s.token.balance_of(pool));
        if reserves.0 > live_balances.0 || reserves.1 > live_balances.1 {
            return Err(ExchangeError::InvariantViolation(format!(
                "reserves {reserves:?} exceed live balances {live_balances:?}"
            )));
        }

        Ok(AuditReport {
            token_supply: s.token.total_supply(),
            lp_supply: s.pool.total_supply(),
            currency_issued: s.currency.total_issued(),
            reserves,
            live_balances,
        })
    }

    // ─── Native currency ──────────────────────────────────────────────────────

    /// Credit fresh native currency (host genesis / faucet).
    pub fn fund_currency(&mut self, to: Address, amount: Amount) -> ExchangeResult<()> {
        self.execute("fund_currency", |s, _| s.currency.fund(to, amount))
    }

    pub fn send_currency(&mut self, caller: Address, to: Address, amount: Amount) -> ExchangeResult<()> {
        self.execute("send_currency", |s, _| s.currency.transfer(caller, to, amount))
    }

    // ─── Token ────────────────────────────────────────────────────────────────

    pub fn initialize(
        &mut self,
        caller: Address,
        receiver: Address,
        treasury: Address,
        allowed: &[Address],
    ) -> ExchangeResult<()> {
        self.execute("initialize", |s, ev| s.token.initialize(caller, receiver, treasury, allowed, ev))
    }

    pub fn enable_transfers(&mut self, caller: Address) -> ExchangeResult<()> {
        self.execute("enable_transfers", |s, _| s.token.enable_transfers(caller))
    }

    pub fn enable_tax(&mut self, caller: Address, enabled: bool) -> ExchangeResult<()> {
        self.execute("enable_tax", |s, ev| s.token.enable_tax(caller, enabled, ev))
    }

    pub fn transfer(&mut self, caller: Address, to: Address, amount: Amount) -> ExchangeResult<TransferReceipt> {
        self.execute("transfer", |s, ev| s.token.transfer(caller, to, amount, ev))
    }

    pub fn transfer_from(
        &mut self,
        caller: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> ExchangeResult<TransferReceipt> {
        self.execute("transfer_from", |s, ev| s.token.transfer_from(caller, owner, to, amount, ev))
    }

    pub fn approve(&mut self, caller: Address, spender: Address, amount: Amount) -> ExchangeResult<()> {
        self.execute("approve", |s, ev| {
            s.token.approve(caller, spender, amount, ev);
            Ok(())
        })
    }

    pub fn increase_allowance(&mut self, caller: Address, spender: Address, added: Amount) -> ExchangeResult<Amount> {
        self.execute("increase_allowance", |s, ev| s.token.increase_allowance(caller, spender, added, ev))
    }

    // ─── Pool ─────────────────────────────────────────────────────────────────

    pub fn sync(&mut self) -> ExchangeResult<(Amount, Amount)> {
        self.execute("sync", |s, ev| {
            let ledgers = Ledgers { currency: &mut s.currency, token: &mut s.token };
            s.pool.sync(&ledgers, ev);
            Ok(s.pool.get_reserves())
        })
    }

    /// Privileged settle step, callable by anyone. Only meaningful after the
    /// caller delivered assets to the pool itself.
    pub fn pool_mint(&mut self, caller: Address, to: Address) -> ExchangeResult<Amount> {
        self.execute("pool_mint", |s, ev| {
            let mut ledgers = Ledgers { currency: &mut s.currency, token: &mut s.token };
            s.pool.mint(caller, to, &mut ledgers, ev)
        })
    }

    pub fn pool_burn(&mut self, caller: Address, to: Address) -> ExchangeResult<(Amount, Amount)> {
        self.execute("pool_burn", |s, ev| {
            let mut ledgers = Ledgers { currency: &mut s.currency, token: &mut s.token };
            s.pool.burn(caller, to, &mut ledgers, ev)
        })
    }

    pub fn pool_swap(
        &mut self,
        caller: Address,
        amount_currency_out: Amount,
        amount_token_out: Amount,
        to: Address,
    ) -> ExchangeResult<()> {
        self.execute("pool_swap", |s, ev| {
            let mut ledgers = Ledgers { currency: &mut s.currency, token: &mut s.token };
            s.pool.swap(caller, amount_currency_out, amount_token_out, to, &mut ledgers, ev)
        })
    }

    pub fn approve_shares(&mut self, caller: Address, spender: Address, amount: Amount) -> ExchangeResult<()> {
        self.execute("approve_shares", |s, ev| {
            s.pool.approve(caller, spender, amount, ev);
            Ok(())
        })
    }

    pub fn increase_share_allowance(&mut self, caller: Address, spender: Address, added: Amount) -> ExchangeResult<Amount> {
        self.execute("increase_share_allowance", |s, ev| s.pool.increase_allowance(caller, spender, added, ev))
    }

    pub fn transfer_shares(&mut self, caller: Address, to: Address, amount: Amount) -> ExchangeResult<()> {
        self.execute("transfer_shares", |s, ev| s.pool.transfer(caller, to, amount, ev))
    }

    pub fn transfer_shares_from(
        &mut self,
        caller: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> ExchangeResult<()> {
        self.execute("transfer_shares_from", |s, ev| s.pool.transfer_from(caller, owner, to, amount, ev))
    }

    // ─── Router ───────────────────────────────────────────────────────────────

    pub fn add_liquidity(
        &mut self,
        caller: Address,
        amount_token_desired: Amount,
        to: Address,
        value_currency: Amount,
    ) -> ExchangeResult<Amount> {
        self.execute("add_liquidity", |s, ev| {
            let mut ledgers = Ledgers { currency: &mut s.currency, token: &mut s.token };
            s.router.add_liquidity(caller, amount_token_desired, to, value_currency, &mut s.pool, &mut ledgers, ev)
        })
    }

    pub fn remove_liquidity(&mut self, caller: Address, liquidity: Amount, to: Address) -> ExchangeResult<(Amount, Amount)> {
        self.execute("remove_liquidity", |s, ev| {
            let mut ledgers = Ledgers { currency: &mut s.currency, token: &mut s.token };
            s.router.remove_liquidity(caller, liquidity, to, &mut s.pool, &mut ledgers, ev)
        })
    }

    pub fn swap(
        &mut self,
        caller: Address,
        amount_token_in: Amount,
        amount_out_min: Amount,
        to: Address,
        value_currency: Amount,
    ) -> ExchangeResult<Amount> {
        self.execute("swap", |s, ev| {
            let mut ledgers = Ledgers { currency: &mut s.currency, token: &mut s.token };
            s.router.swap(caller, amount_token_in, amount_out_min, to, value_currency, &mut s.pool, &mut ledgers, ev)
        })
    }
}

// ─── Shared handle ────────────────────────────────────────────────────────────

/// Cloneable handle that serializes every call on one exchange behind a single
/// lock, so concurrent callers observe a strict run-to-completion order.
#[derive(Clone)]
pub struct SharedExchange {
    inner: Arc<Mutex<Exchange>>,
}

impl SharedExchange {
    pub fn new(exchange: Exchange) -> Self {
        Self { inner: Arc::new(Mutex::new(exchange)) }
    }

    /// Run `f` with exclusive access. Nothing else touches the ledger until it
    /// returns.
    pub fn with<R>(&self, f: impl FnOnce(&mut Exchange) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrapped() -> (Exchange, BootstrapParams) {
        let params = BootstrapParams::default();
        (Exchange::bootstrap(&params).unwrap(), params)
    }

    #[test]
    fn bootstrap_allows_pool_and_router() {
        let (ex, params) = bootstrapped();
        assert!(ex.token().transfers_enabled());
        assert!(ex.token().is_allowed(params.pool_address));
        assert!(ex.token().is_allowed(params.router_address));
        assert_eq!(ex.router().token(), params.token_address);
        assert_eq!(ex.router().pool(), params.pool_address);
        assert_eq!(ex.pool().token(), params.token_address);
        ex.audit().unwrap();
    }

    #[test]
    fn failed_operation_rolls_back_earlier_legs() {
        let (mut ex, params) = bootstrapped();
        let alice = Address(0xA1);
        ex.transfer(params.deployer, alice, 1_000).unwrap();
        ex.approve(alice, params.router_address, 1_000).unwrap();
        let journal_len = ex.events().len();

        // Token leg succeeds, then the currency leg overdraws.
        let err = ex.add_liquidity(alice, 1_000, alice, 5).unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientBalance { .. }));

        assert_eq!(ex.token_balance(alice), 1_000);
        assert_eq!(ex.token_balance(params.pool_address), 0);
        assert_eq!(ex.token().allowance(alice, params.router_address), 1_000);
        assert_eq!(ex.events().len(), journal_len);
    }

    #[test]
    fn shared_handle_serializes_callers() {
        let (mut ex, params) = bootstrapped();
        ex.fund_currency(params.deployer, 1_000).unwrap();
        let shared = SharedExchange::new(ex);

        std::thread::scope(|scope| {
            for i in 0..8u64 {
                let shared = shared.clone();
                let deployer = params.deployer;
                scope.spawn(move || {
                    shared.with(|ex| ex.send_currency(deployer, Address(0x100 + i), 10)).unwrap();
                });
            }
        });

        shared.with(|ex| {
            assert_eq!(ex.currency_balance(params.deployer), 920);
            ex.audit().unwrap();
        });
    }
}
