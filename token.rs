//! Tax-on-transfer token ledger.
//!
//! Transfers are gated by an allow-list until the owner opens them globally,
//! and while tax is enabled every movement is split into a treasury-bound tax
//! leg and a net leg. Downstream consumers must read the returned
//! [`TransferReceipt`] rather than trusting the requested amount.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::errors::{ExchangeError, ExchangeResult};
use crate::events::{Event, EventLog};
use crate::shares::FungibleLedger;
use crate::types::{
    Address, Amount, TransferReceipt, RECEIVER_ALLOCATION, TOKEN_NAME, TOKEN_SYMBOL,
    TREASURY_ALLOCATION,
};

#[derive(Clone, Debug)]
pub struct TaxToken {
    address: Address,
    owner: Address,
    treasury: Address,
    ledger: FungibleLedger,
    allowed: BTreeSet<Address>,
    transfers_enabled: bool,
    tax_enabled: bool,
    initialized: bool,
}

impl TaxToken {
    /// Deploy at `address`. The deployer becomes owner and, until
    /// `initialize` says otherwise, the treasury.
    pub fn deploy(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            treasury: owner,
            ledger: FungibleLedger::new(),
            allowed: BTreeSet::new(),
            transfers_enabled: false,
            tax_enabled: false,
            initialized: false,
        }
    }

    // ─── Views ────────────────────────────────────────────────────────────────

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &'static str {
        TOKEN_NAME
    }

    pub fn symbol(&self) -> &'static str {
        TOKEN_SYMBOL
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn treasury(&self) -> Address {
        self.treasury
    }

    pub fn total_supply(&self) -> Amount {
        self.ledger.total_supply()
    }

    pub fn balance_of(&self, account: Address) -> Amount {
        self.ledger.balance_of(account)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.ledger.allowance(owner, spender)
    }

    pub fn tax_enabled(&self) -> bool {
        self.tax_enabled
    }

    pub fn transfers_enabled(&self) -> bool {
        self.transfers_enabled
    }

    pub fn is_allowed(&self, account: Address) -> bool {
        self.allowed.contains(&account)
    }

    pub fn ledger(&self) -> &FungibleLedger {
        &self.ledger
    }

    // ─── Owner operations ─────────────────────────────────────────────────────

    /// One-time setup: mint the fixed supply, record the treasury and the
    /// bootstrap allow-list.
    pub fn initialize(
        &mut self,
        caller: Address,
        receiver: Address,
        treasury: Address,
        allowed: &[Address],
        events: &mut EventLog,
    ) -> ExchangeResult<()> {
        self.ensure_owner(caller)?;
        if self.initialized {
            return Err(ExchangeError::AlreadyInitialized);
        }

        self.treasury = treasury;
        self.allowed.extend(allowed.iter().copied());

        self.ledger.mint(receiver, RECEIVER_ALLOCATION)?;
        events.emit(Event::Transferred { from: Address::ZERO, to: receiver, amount: RECEIVER_ALLOCATION });
        self.ledger.mint(treasury, TREASURY_ALLOCATION)?;
        events.emit(Event::Transferred { from: Address::ZERO, to: treasury, amount: TREASURY_ALLOCATION });

        self.initialized = true;
        info!(%receiver, %treasury, allowed = allowed.len(), "token initialized");
        Ok(())
    }

    /// Open transfers to everyone. The latch never closes again; repeated
    /// calls are harmless.
    pub fn enable_transfers(&mut self, caller: Address) -> ExchangeResult<()> {
        self.ensure_owner(caller)?;
        if !self.transfers_enabled {
            self.transfers_enabled = true;
            info!("token transfers enabled");
        }
        Ok(())
    }

    pub fn enable_tax(&mut self, caller: Address, enabled: bool, events: &mut EventLog) -> ExchangeResult<()> {
        self.ensure_owner(caller)?;
        if self.tax_enabled == enabled {
            return Err(ExchangeError::NoOp);
        }
        self.tax_enabled = enabled;
        events.emit(Event::TaxToggled { enabled });
        info!(enabled, "token tax toggled");
        Ok(())
    }

    // ─── Holder operations ────────────────────────────────────────────────────

    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: Amount,
        events: &mut EventLog,
    ) -> ExchangeResult<TransferReceipt> {
        self.move_tokens(caller, to, amount, events)
    }

    /// Move `owner`'s tokens on their behalf. The allowance is charged the
    /// gross amount, tax included.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
        events: &mut EventLog,
    ) -> ExchangeResult<TransferReceipt> {
        self.check_movable(owner, to, amount)?;
        self.ledger.spend_allowance(owner, spender, amount)?;
        self.move_tokens(owner, to, amount, events)
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount, events: &mut EventLog) {
        self.ledger.approve(owner, spender, amount);
        events.emit(Event::Approval { owner, spender, amount });
    }

    pub fn increase_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        added: Amount,
        events: &mut EventLog,
    ) -> ExchangeResult<Amount> {
        let amount = self.ledger.increase_allowance(owner, spender, added)?;
        events.emit(Event::Approval { owner, spender, amount });
        Ok(amount)
    }

    fn move_tokens(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
        events: &mut EventLog,
    ) -> ExchangeResult<TransferReceipt> {
        self.check_movable(from, to, amount)?;

        let receipt = if self.tax_enabled {
            TransferReceipt::taxed(amount)
        } else {
            TransferReceipt::untaxed(amount)
        };

        if receipt.tax > 0 {
            self.ledger.move_balance(from, self.treasury, receipt.tax)?;
            events.emit(Event::Transferred { from, to: self.treasury, amount: receipt.tax });
        }
        self.ledger.move_balance(from, to, receipt.net)?;
        events.emit(Event::Transferred { from, to, amount: receipt.net });

        debug!(%from, %to, gross = receipt.gross, net = receipt.net, tax = receipt.tax, "token moved");
        Ok(receipt)
    }

    /// Every rejection a movement can hit, checked before either leg touches
    /// a balance.
    fn check_movable(&self, from: Address, to: Address, amount: Amount) -> ExchangeResult<()> {
        if !(self.transfers_enabled || self.is_allowed(from) || self.is_allowed(to)) {
            return Err(ExchangeError::TransferNotAllowed);
        }
        if to == self.address {
            return Err(ExchangeError::SelfTransferDisallowed);
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(ExchangeError::InsufficientBalance { account: from, needed: amount, available });
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: Address) -> ExchangeResult<()> {
        if caller != self.owner {
            return Err(ExchangeError::AccessDenied);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TAX_PERCENTAGE, TOTAL_SUPPLY};

    const TOKEN: Address = Address(0x70);
    const DEPLOYER: Address = Address(1);
    const TREASURY: Address = Address(2);
    const ALICE: Address = Address(3);
    const BOB: Address = Address(4);

    fn initialized() -> (TaxToken, EventLog) {
        let mut events = EventLog::new();
        let mut token = TaxToken::deploy(TOKEN, DEPLOYER);
        token.initialize(DEPLOYER, DEPLOYER, TREASURY, &[DEPLOYER], &mut events).unwrap();
        (token, events)
    }

    #[test]
    fn tokenomics() {
        let (token, events) = initialized();
        assert_eq!(token.name(), "NewCoin");
        assert_eq!(token.symbol(), "NEW");
        assert_eq!(token.owner(), DEPLOYER);
        assert_eq!(token.treasury(), TREASURY);
        assert_eq!(token.total_supply(), TOTAL_SUPPLY);
        assert_eq!(token.balance_of(DEPLOYER), 150_000);
        assert_eq!(token.balance_of(TREASURY), 350_000);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn second_initialize_fails() {
        let (mut token, mut events) = initialized();
        assert_eq!(
            token.initialize(DEPLOYER, ALICE, TREASURY, &[], &mut events),
            Err(ExchangeError::AlreadyInitialized)
        );
        assert_eq!(token.total_supply(), TOTAL_SUPPLY);
    }

    #[test]
    fn tax_toggle_is_owner_only_and_never_redundant() {
        let (mut token, _) = initialized();
        let mut events = EventLog::new();
        assert!(!token.tax_enabled());
        assert_eq!(TAX_PERCENTAGE, 5);

        assert_eq!(token.enable_tax(ALICE, true, &mut events), Err(ExchangeError::AccessDenied));
        assert_eq!(token.enable_tax(DEPLOYER, false, &mut events), Err(ExchangeError::NoOp));

        token.enable_tax(DEPLOYER, true, &mut events).unwrap();
        assert!(token.tax_enabled());
        token.enable_tax(DEPLOYER, false, &mut events).unwrap();
        assert!(!token.tax_enabled());

        assert_eq!(
            events.into_events(),
            vec![Event::TaxToggled { enabled: true }, Event::TaxToggled { enabled: false }]
        );
    }

    #[test]
    fn taxed_transfer_from_emits_both_legs() {
        let (mut token, _) = initialized();
        let mut events = EventLog::new();
        token.transfer(DEPLOYER, ALICE, 100, &mut events).unwrap();
        assert_eq!(token.balance_of(ALICE), 100);

        token.enable_tax(DEPLOYER, true, &mut events).unwrap();
        token.increase_allowance(DEPLOYER, DEPLOYER, 100, &mut events).unwrap();

        let mut events = EventLog::new();
        let receipt = token.transfer_from(DEPLOYER, DEPLOYER, BOB, 100, &mut events).unwrap();
        assert_eq!(receipt, TransferReceipt { gross: 100, net: 95, tax: 5 });
        assert_eq!(token.balance_of(BOB), 95);
        assert_eq!(token.balance_of(TREASURY), 350_005);
        assert_eq!(token.allowance(DEPLOYER, DEPLOYER), 0);
        assert_eq!(
            events.into_events(),
            vec![
                Event::Transferred { from: DEPLOYER, to: TREASURY, amount: 5 },
                Event::Transferred { from: DEPLOYER, to: BOB, amount: 95 },
            ]
        );
    }

    #[test]
    fn allow_list_gates_until_transfers_open() {
        let (mut token, mut events) = initialized();
        token.transfer(DEPLOYER, ALICE, 100, &mut events).unwrap();
        assert_eq!(token.transfer(ALICE, BOB, 50, &mut events), Err(ExchangeError::TransferNotAllowed));

        assert_eq!(token.enable_transfers(ALICE), Err(ExchangeError::AccessDenied));
        token.enable_transfers(DEPLOYER).unwrap();
        token.enable_transfers(DEPLOYER).unwrap();

        let receipt = token.transfer(ALICE, BOB, 50, &mut events).unwrap();
        assert_eq!(receipt, TransferReceipt::untaxed(50));
        assert_eq!(token.balance_of(BOB), 50);
    }

    #[test]
    fn transfer_to_token_contract_is_rejected() {
        let (mut token, mut events) = initialized();
        assert_eq!(token.transfer(DEPLOYER, TOKEN, 50, &mut events), Err(ExchangeError::SelfTransferDisallowed));
    }

    #[test]
    fn uncovered_taxed_transfer_leaves_balances_untouched() {
        let (mut token, mut events) = initialized();
        token.transfer(DEPLOYER, ALICE, 100, &mut events).unwrap();
        token.enable_transfers(DEPLOYER).unwrap();
        token.enable_tax(DEPLOYER, true, &mut events).unwrap();
        let logged = events.len();

        let err = token.transfer(ALICE, BOB, 101, &mut events).unwrap_err();
        assert_eq!(err, ExchangeError::InsufficientBalance { account: ALICE, needed: 101, available: 100 });
        assert_eq!(token.balance_of(ALICE), 100);
        assert_eq!(token.balance_of(TREASURY), 350_000);
        assert_eq!(events.len(), logged);
    }

    #[test]
    fn uncovered_transfer_from_keeps_allowance() {
        let (mut token, mut events) = initialized();
        token.transfer(DEPLOYER, ALICE, 100, &mut events).unwrap();
        token.enable_transfers(DEPLOYER).unwrap();
        token.enable_tax(DEPLOYER, true, &mut events).unwrap();
        token.approve(ALICE, BOB, 500, &mut events);

        let err = token.transfer_from(BOB, ALICE, BOB, 101, &mut events).unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientBalance { needed: 101, available: 100, .. }));
        assert_eq!(token.allowance(ALICE, BOB), 500);
        assert_eq!(token.balance_of(ALICE), 100);
    }

    #[test]
    fn transfer_from_requires_allowance() {
        let (mut token, mut events) = initialized();
        token.approve(DEPLOYER, ALICE, 10, &mut events);
        let err = token.transfer_from(ALICE, DEPLOYER, BOB, 11, &mut events).unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientAllowance { needed: 11, available: 10, .. }));
    }
}
