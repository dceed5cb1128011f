use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use taxswap::config::SimConfig;
use taxswap::router::get_amount_out;
use taxswap::sim::{aggregate_results, run_parallel, SimResult};
use taxswap::types::{Address, Amount};
use taxswap::{BootstrapParams, Exchange};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taxswap", about = "Tax-aware constant-product exchange")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Run randomized add/remove/swap simulations and audit every step
	Simulate {
		#[arg(long, default_value_t = 100)]
		simulations: usize,
		/// Operations per simulation (overrides config and FUZZ_ITERATIONS)
		#[arg(long)]
		iterations: Option<usize>,
		#[arg(long, default_value_t = 0)]
		seed_start: u64,
		/// JSON file with simulation settings
		#[arg(long)]
		config: Option<PathBuf>,
		/// Leave the transfer tax off
		#[arg(long)]
		no_tax: bool,
		/// Write a JSON report here
		#[arg(long)]
		report: Option<PathBuf>,
	},
	/// Quote the output of a swap against the given reserves
	Quote {
		amount_in: Amount,
		reserve_in: Amount,
		reserve_out: Amount,
	},
	/// Bootstrap an exchange, run one of each operation and print the events
	Demo,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taxswap=info")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	match cli.command {
		Commands::Simulate {
			simulations,
			iterations,
			seed_start,
			config,
			no_tax,
			report,
		} => {
			let mut sim_config = match config {
				Some(path) => SimConfig::load(&path)?,
				None => SimConfig::default(),
			};
			sim_config.apply_env()?;
			if let Some(iterations) = iterations {
				sim_config.iterations = iterations;
			}
			if no_tax {
				sim_config.tax_enabled = false;
			}
			simulate_cmd(&sim_config, simulations, seed_start, report.as_deref())
		}
		Commands::Quote {
			amount_in,
			reserve_in,
			reserve_out,
		} => {
			let out = get_amount_out(amount_in, reserve_in, reserve_out)?;
			println!("{out}");
			Ok(())
		}
		Commands::Demo => demo_cmd(),
	}
}

fn simulate_cmd(config: &SimConfig, simulations: usize, seed_start: u64, report: Option<&Path>) -> Result<()> {
	if simulations == 0 {
		bail!("Run at least one simulation.");
	}

	let results = run_parallel(config, simulations, seed_start)?;
	let summary = aggregate_results(&results).context("no simulation results")?;

	println!("\n    Seed     Adds  Removes    Swaps   Rejected   Tax (NEW)   k growth");
	println!("----------------------------------------------------------------------");
	for r in &results {
		println!(
			"{:>8} {:>8} {:>8} {:>8} {:>10} {:>11} {:>10.6}",
			r.seed,
			r.adds.committed,
			r.removes.committed,
			r.swaps.committed,
			r.adds.rejected + r.removes.rejected + r.swaps.rejected,
			r.tax_collected,
			r.k_growth
		);
	}
	println!(
		"\n{} simulations: mean committed {:.1}, mean rejected {:.1}, mean tax {:.1}, k growth mean {:.6} / min {:.6}",
		summary.simulations,
		summary.mean_committed,
		summary.mean_rejected,
		summary.mean_tax_collected,
		summary.mean_k_growth,
		summary.min_k_growth
	);

	if let Some(path) = report {
		write_report(path, config, &results)?;
		println!("\nReport: {}", path.display());
	}

	Ok(())
}

fn demo_cmd() -> Result<()> {
	let params = BootstrapParams::default();
	let mut ex = Exchange::bootstrap(&params)?;
	let router = params.router_address;
	let trader = Address(0xA11CE);

	ex.fund_currency(params.treasury, 30_000)?;
	ex.approve(params.treasury, router, 150_000)?;
	ex.add_liquidity(params.treasury, 150_000, params.treasury, 30_000)?;
	ex.enable_tax(params.deployer, true)?;

	ex.fund_currency(trader, 100)?;
	ex.transfer(params.receiver, trader, 1_000)?;
	ex.swap(trader, 0, 0, trader, 10)?;
	ex.approve(trader, router, 500)?;
	ex.swap(trader, 500, 0, trader, 0)?;
	ex.approve(trader, router, 250)?;
	let liquidity = ex.add_liquidity(trader, 250, trader, 50)?;
	ex.approve_shares(trader, router, liquidity)?;
	ex.remove_liquidity(trader, liquidity, trader)?;

	let audit = ex.audit()?;
	let payload = json!({
		"events": ex.events(),
		"audit": audit,
	});
	println!("{}", serde_json::to_string_pretty(&payload)?);
	Ok(())
}

fn write_report(path: &Path, config: &SimConfig, results: &[SimResult]) -> Result<()> {
	let ts = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
	if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
		fs::create_dir_all(dir)?;
	}

	let payload = json!({
		"timestamp": ts,
		"config": config,
		"summary": aggregate_results(results),
		"simulations": results,
	});

	fs::write(path, serde_json::to_vec_pretty(&payload)?)
		.with_context(|| format!("failed to write report {}", path.display()))?;
	Ok(())
}
