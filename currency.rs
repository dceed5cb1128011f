use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{ExchangeError, ExchangeResult};
use crate::types::{checked_credit, Address, Amount};

/// Native settlement-currency balances.
///
/// Value only enters through `fund` (the host's genesis/faucet) and otherwise
/// just moves between accounts, so the sum of balances always equals
/// `total_issued`.
#[derive(Clone, Debug, Default)]
pub struct CurrencyLedger {
    balances: BTreeMap<Address, Amount>,
    total_issued: Amount,
}

impl CurrencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: Address) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    pub fn total_issued(&self) -> Amount {
        self.total_issued
    }

    pub fn sum_of_balances(&self) -> ExchangeResult<Amount> {
        self.balances
            .values()
            .try_fold(0, |acc: Amount, b| checked_credit(acc, *b))
    }

    pub fn fund(&mut self, to: Address, amount: Amount) -> ExchangeResult<()> {
        let issued = checked_credit(self.total_issued, amount)?;
        let balance = checked_credit(self.balance_of(to), amount)?;
        self.balances.insert(to, balance);
        self.total_issued = issued;
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> ExchangeResult<()> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(ExchangeError::InsufficientBalance { account: from, needed: amount, available });
        }
        if amount == 0 || from == to {
            return Ok(());
        }
        self.balances.insert(from, available - amount);
        let credited = checked_credit(self.balance_of(to), amount)?;
        self.balances.insert(to, credited);
        debug!(%from, %to, amount, "currency moved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_conserves_issued_value() {
        let mut c = CurrencyLedger::new();
        c.fund(Address(1), 100).unwrap();
        c.transfer(Address(1), Address(2), 40).unwrap();
        assert_eq!(c.balance_of(Address(1)), 60);
        assert_eq!(c.balance_of(Address(2)), 40);
        assert_eq!(c.sum_of_balances().unwrap(), c.total_issued());
    }

    #[test]
    fn overdraw_is_rejected() {
        let mut c = CurrencyLedger::new();
        c.fund(Address(1), 10).unwrap();
        let err = c.transfer(Address(1), Address(2), 11).unwrap_err();
        assert_eq!(err, ExchangeError::InsufficientBalance { account: Address(1), needed: 11, available: 10 });
    }
}
