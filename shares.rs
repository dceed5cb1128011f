use std::collections::BTreeMap;

use crate::errors::{ExchangeError, ExchangeResult};
use crate::types::{checked_credit, Address, Amount, UNLIMITED_ALLOWANCE};

/// Balances, allowances and supply of one fungible asset.
///
/// Backs both the tax token and the pool's liquidity shares. It knows nothing
/// about tax, allow-lists or events; the owning component layers those on.
#[derive(Clone, Debug, Default)]
pub struct FungibleLedger {
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
    total_supply: Amount,
}

impl FungibleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: Address) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    /// Sum of every balance. Equal to `total_supply` in every committed state.
    pub fn sum_of_balances(&self) -> ExchangeResult<Amount> {
        self.balances
            .values()
            .try_fold(0, |acc: Amount, b| checked_credit(acc, *b))
    }

    pub fn holders(&self) -> impl Iterator<Item = (Address, Amount)> + '_ {
        self.balances.iter().map(|(a, b)| (*a, *b))
    }

    pub fn mint(&mut self, to: Address, amount: Amount) -> ExchangeResult<()> {
        let supply = checked_credit(self.total_supply, amount)?;
        self.credit(to, amount)?;
        self.total_supply = supply;
        Ok(())
    }

    pub fn burn(&mut self, from: Address, amount: Amount) -> ExchangeResult<()> {
        self.debit(from, amount)?;
        self.total_supply -= amount;
        Ok(())
    }

    /// Move `amount` from one balance to another. Supply is unchanged.
    pub fn move_balance(&mut self, from: Address, to: Address, amount: Amount) -> ExchangeResult<()> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    /// Returns the new allowance.
    pub fn increase_allowance(&mut self, owner: Address, spender: Address, added: Amount) -> ExchangeResult<Amount> {
        let updated = checked_credit(self.allowance(owner, spender), added)?;
        self.approve(owner, spender, updated);
        Ok(updated)
    }

    /// Consume `amount` of `spender`'s allowance over `owner`'s balance.
    pub fn spend_allowance(&mut self, owner: Address, spender: Address, amount: Amount) -> ExchangeResult<()> {
        let available = self.allowance(owner, spender);
        if available == UNLIMITED_ALLOWANCE {
            return Ok(());
        }
        if available < amount {
            return Err(ExchangeError::InsufficientAllowance { owner, spender, needed: amount, available });
        }
        self.approve(owner, spender, available - amount);
        Ok(())
    }

    fn debit(&mut self, account: Address, amount: Amount) -> ExchangeResult<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(ExchangeError::InsufficientBalance { account, needed: amount, available });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, remaining);
        }
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: Amount) -> ExchangeResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let updated = checked_credit(self.balance_of(account), amount)?;
        self.balances.insert(account, updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = Address(1);
    const BOB: Address = Address(2);

    #[test]
    fn mint_burn_track_supply() {
        let mut l = FungibleLedger::new();
        l.mint(ALICE, 100).unwrap();
        l.mint(BOB, 50).unwrap();
        l.burn(ALICE, 30).unwrap();
        assert_eq!(l.total_supply(), 120);
        assert_eq!(l.sum_of_balances().unwrap(), 120);
        assert!(matches!(l.burn(BOB, 51), Err(ExchangeError::InsufficientBalance { .. })));
    }

    #[test]
    fn allowance_is_consumed_unless_unlimited() {
        let mut l = FungibleLedger::new();
        l.approve(ALICE, BOB, 10);
        l.spend_allowance(ALICE, BOB, 4).unwrap();
        assert_eq!(l.allowance(ALICE, BOB), 6);
        assert!(matches!(
            l.spend_allowance(ALICE, BOB, 7),
            Err(ExchangeError::InsufficientAllowance { available: 6, .. })
        ));

        l.approve(ALICE, BOB, UNLIMITED_ALLOWANCE);
        l.spend_allowance(ALICE, BOB, 1_000).unwrap();
        assert_eq!(l.allowance(ALICE, BOB), UNLIMITED_ALLOWANCE);
    }

    #[test]
    fn failed_move_leaves_balances_alone() {
        let mut l = FungibleLedger::new();
        l.mint(ALICE, 5).unwrap();
        assert!(l.move_balance(ALICE, BOB, 6).is_err());
        assert_eq!(l.balance_of(ALICE), 5);
        assert_eq!(l.balance_of(BOB), 0);
    }
}
