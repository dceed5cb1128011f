use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Amount;

/// Configuration for a randomized exchange simulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Random add/remove/swap operations per simulation
    pub iterations: usize,
    /// Token units deposited per currency unit when adding liquidity
    pub ratio: Amount,
    /// Turn the 5% transfer tax on after seeding the pool
    pub tax_enabled: bool,
    /// Initial pool funding `(currency, token)`, paid by the treasury
    pub seed_liquidity: (Amount, Amount),
    /// Native currency granted to every simulated trader
    pub participant_currency: Amount,
    /// Tokens granted to every simulated trader
    pub participant_token: Amount,
    /// Number of simulated traders
    pub participants: usize,
    /// Log-normal mean of an operation's size, in currency units
    pub trade_size_mean: f64,
    /// Log-normal shape of an operation's size
    pub trade_size_sigma: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            ratio: 5,
            tax_enabled: true,
            seed_liquidity: (30_000, 150_000),
            participant_currency: 5_000,
            participant_token: 10_000,
            participants: 3,
            trade_size_mean: 20.0,
            trade_size_sigma: 1.2,
        }
    }
}

impl SimConfig {
    /// Defaults overlaid with `FUZZ_ITERATIONS`, `RATIO` and `NEW_TAX_ON`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Read a JSON config file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config {}", path.display()))?;
        debug!(path = %path.display(), "simulation config loaded");
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = env::var("FUZZ_ITERATIONS") {
            self.iterations = v.parse().with_context(|| format!("FUZZ_ITERATIONS={v}"))?;
        }
        if let Ok(v) = env::var("RATIO") {
            self.ratio = v.parse().with_context(|| format!("RATIO={v}"))?;
        }
        if let Ok(v) = env::var("NEW_TAX_ON") {
            self.tax_enabled = v != "0";
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.ratio > 0, "ratio must be positive");
        anyhow::ensure!(self.participants > 0, "need at least one participant");
        anyhow::ensure!(
            self.trade_size_mean > 0.0 && self.trade_size_sigma > 0.0,
            "trade size distribution must have positive mean and shape"
        );
        Ok(())
    }
}
