use serde::Serialize;

use crate::types::{Address, Amount};

/// Notifications emitted by committed operations.
///
/// `Transferred` is emitted once per token movement, twice when tax is
/// deducted: the treasury-bound tax leg first, then the net leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum Event {
    TaxToggled { enabled: bool },
    Transferred { from: Address, to: Address, amount: Amount },
    Approval { owner: Address, spender: Address, amount: Amount },
    /// LP share movement (mint/burn use the zero address on one side).
    SharesTransferred { from: Address, to: Address, amount: Amount },
    SharesApproval { owner: Address, spender: Address, amount: Amount },
    LiquidityMinted { caller: Address, to: Address, amount_currency: Amount, amount_token: Amount },
    LiquidityBurned { caller: Address, to: Address, amount_currency: Amount, amount_token: Amount },
    Swapped {
        caller: Address,
        to: Address,
        amount_currency_in: Amount,
        amount_token_in: Amount,
        amount_currency_out: Amount,
        amount_token_out: Amount,
    },
    ReservesUpdated { reserve_currency: Amount, reserve_token: Amount },
}

/// Events buffered by one in-flight operation. Discarded if it aborts.
#[derive(Debug, Default)]
pub struct EventLog {
    pending: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn emit(&mut self, event: Event) {
        self.pending.push(event);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.pending
    }
}
