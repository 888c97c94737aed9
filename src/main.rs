//! feedctl - Oracle Feed Listing Pipeline
//!
//! Command-line front end for the feed listing library. Assembles the
//! fallback-aware price job graphs a listing would deploy and prints them
//! for operator review, without touching the network.
//!
//! ## Commands
//!
//! - **preview**: build and print the job graphs for one listing
//! - **tiers**: print the listing tier settings table

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedctl::config::{FeedCtlConfig, OracleEnv};
use feedctl::jobs::assembler::{self, AssetSpec, MIN_REQUIRED_JOB_RESULTS};
use feedctl::pools::PoolAddresses;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "feedctl.toml", env = "FEEDCTL_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble and print the job graphs for one listing
    Preview {
        /// Base token symbol, e.g. MNGO
        #[arg(long)]
        symbol: String,

        /// Base token mint address
        #[arg(long)]
        mint: String,

        /// Listing tier
        #[arg(long, default_value = "mid_wit")]
        tier: String,

        /// Orca pool address
        #[arg(long)]
        orca_pool: Option<String>,

        /// Raydium pool address
        #[arg(long)]
        raydium_pool: Option<String>,

        /// Staking pool address
        #[arg(long)]
        stake_pool: Option<String>,

        /// The pool stores the pair reversed
        #[arg(long)]
        reversed: bool,

        /// The pool quotes in SOL rather than USDC
        #[arg(long)]
        sol_quoted: bool,

        /// Rough token price, used to size staking-pool quotes
        #[arg(long, default_value_t = 1.0)]
        token_price: f64,

        /// Base token decimals
        #[arg(long, default_value_t = 9)]
        token_decimals: u8,
    },

    /// Print the listing tier settings table
    Tiers,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("🛰️ Starting feedctl");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if !std::path::Path::new(&args.config).exists() {
        warn!("Config file '{}' not found, using defaults", args.config);
    }
    let config = FeedCtlConfig::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    let env = OracleEnv::from_config(&config)?;

    match args.command {
        Command::Preview {
            symbol,
            mint,
            tier,
            orca_pool,
            raydium_pool,
            stake_pool,
            reversed,
            sol_quoted,
            token_price,
            token_decimals,
        } => {
            let pools = PoolAddresses {
                orca: parse_optional("orca pool", orca_pool.as_deref())?,
                raydium: parse_optional("raydium pool", raydium_pool.as_deref())?,
                stake_pool: parse_optional("stake pool", stake_pool.as_deref())?,
            };
            let asset = AssetSpec {
                base_symbol: symbol,
                base_mint: parse_pubkey("mint", &mint)?,
                token_price,
                token_decimals,
                sol_quoted,
            };
            preview(&env, &tier, &asset, &pools, reversed)?;
        }
        Command::Tiers => print_tiers(&env),
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "feedctl=debug,info"
    } else {
        "feedctl=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}

fn parse_pubkey(name: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("invalid {name} address '{value}'"))
}

fn parse_optional(name: &str, value: Option<&str>) -> Result<Option<Pubkey>> {
    value.map(|value| parse_pubkey(name, value)).transpose()
}

/// Builds the job graphs for one listing and prints them with the scalar
/// deployment parameters.
fn preview(
    env: &OracleEnv,
    tier: &str,
    asset: &AssetSpec,
    pools: &PoolAddresses,
    reversed: bool,
) -> Result<()> {
    let pool = pools.select()?;
    let settings = env.tier(tier)?;
    let jobs = assembler::assemble_jobs(env, settings, asset, &pool, reversed, None)?;

    println!("feed: {}/USD  tier: {tier}", asset.base_symbol);
    println!(
        "batch size: {}  min oracle results: {}  min job results: {}",
        settings.batch_size, settings.min_required_oracle_results, MIN_REQUIRED_JOB_RESULTS
    );
    println!(
        "update delay: {}s  force report: {}s  fund: {} SOL  swap value: {}",
        settings.min_update_delay_seconds,
        env.feed.force_report_period_secs,
        settings.fund_amount_sol,
        settings.swap_value
    );
    for (index, weighted) in jobs.iter().enumerate() {
        println!("--- job {} (weight {}) ---", index + 1, weighted.weight);
        println!("{}", serde_json::to_string_pretty(&weighted.job)?);
    }
    Ok(())
}

fn print_tiers(env: &OracleEnv) {
    println!(
        "{:<12} {:>6} {:>12} {:>10} {:>9} {:>11}",
        "tier", "batch", "min oracles", "delay (s)", "fund SOL", "swap value"
    );
    for (name, tier) in &env.tiers {
        println!(
            "{:<12} {:>6} {:>12} {:>10} {:>9} {:>11}",
            name,
            tier.batch_size,
            tier.min_required_oracle_results,
            tier.min_update_delay_seconds,
            tier.fund_amount_sol,
            tier.swap_value
        );
    }
}
