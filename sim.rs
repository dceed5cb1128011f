//! Randomized exchange simulation.
//!
//! Replays a stream of add-liquidity, remove-liquidity and swap operations from
//! several traders against one bootstrapped exchange, auditing the ledger after
//! every operation:
//!   1. token, LP-share and currency balances always sum to their supplies
//!   2. reserves never exceed the pool's live balances
//!   3. the reserve product never shrinks across a committed swap

use anyhow::{bail, Context, Result};
use primitive_types::U256;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::config::SimConfig;
use crate::errors::ExchangeError;
use crate::exchange::{BootstrapParams, Exchange};
use crate::types::{Address, Amount};

/// First trader address; the rest follow sequentially.
const TRADER_BASE: u64 = 0xA000;

// ─── Simulation Result ────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize)]
pub struct OpStats {
    pub attempted: u64,
    pub committed: u64,
    pub rejected: u64,
}

impl OpStats {
    fn record(&mut self, committed: bool) {
        self.attempted += 1;
        if committed {
            self.committed += 1;
        } else {
            self.rejected += 1;
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SimResult {
    pub seed: u64,
    pub adds: OpStats,
    pub removes: OpStats,
    pub swaps: OpStats,
    pub final_reserves: (Amount, Amount),
    pub final_lp_supply: Amount,
    /// Tokens the treasury collected as tax during the run
    pub tax_collected: Amount,
    /// sqrt(k_end / k_start), the growth of one LP share's backing
    pub k_growth: f64,
}

// ─── Core Simulation ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
enum Op {
    Add,
    Remove,
    Swap,
}

/// Run one complete simulation from `seed`.
pub fn run_simulation(config: &SimConfig, seed: u64) -> Result<SimResult> {
    config.validate()?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let size_dist = trade_size_distribution(config)?;

    // ── 1. Bootstrap and fund ──────────────────────────────────────────────────
    let params = BootstrapParams::default();
    let mut ex = Exchange::bootstrap(&params).context("bootstrap failed")?;
    let router = params.router_address;
    let traders: Vec<Address> = (0..config.participants as u64).map(|i| Address(TRADER_BASE + i)).collect();

    let (seed_currency, seed_token) = config.seed_liquidity;
    ex.fund_currency(params.treasury, seed_currency)?;
    ex.approve(params.treasury, router, seed_token)?;
    ex.add_liquidity(params.treasury, seed_token, params.treasury, seed_currency)
        .context("seeding liquidity failed")?;

    for &trader in &traders {
        ex.fund_currency(trader, config.participant_currency)?;
        ex.transfer(params.receiver, trader, config.participant_token)
            .with_context(|| format!("funding trader {trader}"))?;
    }

    if config.tax_enabled {
        ex.enable_tax(params.deployer, true)?;
    }

    let treasury_start = ex.token_balance(params.treasury);
    let k_start = reserve_product(ex.get_reserves());
    ex.audit()?;

    // ── 2. Random operations ───────────────────────────────────────────────────
    let mut adds = OpStats::default();
    let mut removes = OpStats::default();
    let mut swaps = OpStats::default();

    for step in 0..config.iterations {
        let trader = traders[rng.gen_range(0..traders.len())];
        let size = (size_dist.sample(&mut rng).round() as Amount).max(1);
        let op = match rng.gen_range(0..3) {
            0 => Op::Add,
            1 => Op::Remove,
            _ => Op::Swap,
        };

        let outcome = match op {
            Op::Add => {
                let tokens = size.saturating_mul(config.ratio);
                ex.approve(trader, router, tokens)?;
                ex.add_liquidity(trader, tokens, trader, size).map(|_| ())
            }
            Op::Remove => {
                let liquidity = size.min(ex.lp_balance(trader));
                ex.approve_shares(trader, router, liquidity)?;
                ex.remove_liquidity(trader, liquidity, trader).map(|_| ())
            }
            Op::Swap => {
                let reserves_before = ex.get_reserves();
                let result = if rng.gen_bool(0.5) {
                    ex.swap(trader, 0, 0, trader, size)
                } else {
                    let tokens = size.saturating_mul(config.ratio);
                    ex.approve(trader, router, tokens)?;
                    ex.swap(trader, tokens, 0, trader, 0)
                };
                if result.is_ok() && reserve_product(ex.get_reserves()) < reserve_product(reserves_before) {
                    bail!(
                        "seed {seed} step {step}: reserve product shrank {:?} -> {:?}",
                        reserves_before,
                        ex.get_reserves()
                    );
                }
                result.map(|_| ())
            }
        };

        let committed = match outcome {
            Ok(()) => true,
            Err(err) if is_expected_rejection(&err) => {
                debug!(seed, step, ?op, %trader, error = %err, "operation rejected");
                false
            }
            Err(err) => bail!("seed {seed} step {step}: unexpected {op:?} failure: {err}"),
        };
        match op {
            Op::Add => adds.record(committed),
            Op::Remove => removes.record(committed),
            Op::Swap => swaps.record(committed),
        }

        ex.audit().with_context(|| format!("seed {seed} step {step} after {op:?}"))?;
    }

    // ── 3. Build result ────────────────────────────────────────────────────────
    let final_reserves = ex.get_reserves();
    let k_end = reserve_product(final_reserves);
    let lp_start = (seed_currency as f64 * seed_token as f64).sqrt();
    let lp_end = ex.pool().total_supply() as f64;
    let k_growth = if lp_end > 0.0 {
        (u256_to_f64(k_end).sqrt() / lp_end) / (u256_to_f64(k_start).sqrt() / lp_start)
    } else {
        0.0
    };

    Ok(SimResult {
        seed,
        adds,
        removes,
        swaps,
        final_reserves,
        final_lp_supply: ex.pool().total_supply(),
        tax_collected: ex.token_balance(params.treasury).saturating_sub(treasury_start),
        k_growth,
    })
}

/// Rejections a well-formed but unlucky operation may hit.
fn is_expected_rejection(err: &ExchangeError) -> bool {
    matches!(
        err,
        ExchangeError::InsufficientBalance { .. }
            | ExchangeError::InsufficientAmounts
            | ExchangeError::InsufficientBurnAmount
            | ExchangeError::InsufficientLiquidity
            | ExchangeError::InsufficientInputAmount
    )
}

fn trade_size_distribution(config: &SimConfig) -> Result<LogNormal<f64>> {
    // E[X] = exp(μ + σ²/2) → μ = ln(E[X]) - σ²/2
    let sigma = config.trade_size_sigma;
    let mu = config.trade_size_mean.ln() - 0.5 * sigma * sigma;
    LogNormal::new(mu, sigma).context("invalid trade size distribution")
}

fn reserve_product((currency, token): (Amount, Amount)) -> U256 {
    U256::from(currency) * U256::from(token)
}

fn u256_to_f64(v: U256) -> f64 {
    v.0.iter().rev().fold(0.0, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64)
}

// ─── Parallel Multi-simulation Runner ────────────────────────────────────────

/// Run `n_sims` independent simulations in parallel.
pub fn run_parallel(config: &SimConfig, n_sims: usize, seed_start: u64) -> Result<Vec<SimResult>> {
    (0..n_sims)
        .into_par_iter()
        .map(|i| run_simulation(config, seed_start + i as u64))
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct AggregatedResult {
    pub simulations: usize,
    pub mean_committed: f64,
    pub mean_rejected: f64,
    pub mean_tax_collected: f64,
    pub mean_k_growth: f64,
    pub min_k_growth: f64,
}

pub fn aggregate_results(sims: &[SimResult]) -> Option<AggregatedResult> {
    if sims.is_empty() {
        return None;
    }
    let n = sims.len() as f64;
    let committed = |s: &SimResult| (s.adds.committed + s.removes.committed + s.swaps.committed) as f64;
    let rejected = |s: &SimResult| (s.adds.rejected + s.removes.rejected + s.swaps.rejected) as f64;

    Some(AggregatedResult {
        simulations: sims.len(),
        mean_committed: sims.iter().map(committed).sum::<f64>() / n,
        mean_rejected: sims.iter().map(rejected).sum::<f64>() / n,
        mean_tax_collected: sims.iter().map(|s| s.tax_collected as f64).sum::<f64>() / n,
        mean_k_growth: sims.iter().map(|s| s.k_growth).sum::<f64>() / n,
        min_k_growth: sims.iter().map(|s| s.k_growth).fold(f64::INFINITY, f64::min),
    })
}
