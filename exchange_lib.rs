extern crate self as taxswap;

pub mod config;
pub mod currency;
pub mod errors;
pub mod events;
pub mod exchange;
pub mod pool;
pub mod router;
pub mod shares;
pub mod sim;
pub mod token;
pub mod types;

pub use errors::{ExchangeError, ExchangeResult};
pub use exchange::{BootstrapParams, Exchange, SharedExchange};

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
