//! Turns a listing request into a complete feed deployment.
//!
//! Two independent job graphs are produced per feed, one anchored on each
//! aggregator quote direction, and both must agree before the network
//! accepts a result. DEX-backed assets get the conditional price graph plus
//! a trailing USD normalization; liquid-staking assets take their graphs
//! verbatim from externally supplied templates.

use solana_sdk::pubkey::Pubkey;

use crate::config::{OracleEnv, TierSettings};
use crate::errors::{FeedError, FeedResult};
use crate::jobs::price::{self, PoolFallbackSpec, PriceDirection, SwapQuoteSpec};
use crate::jobs::task::{OracleJob, Task, WeightedJob};
use crate::oracle::{CrankHandle, QueueHandle};
use crate::pools::SelectedPool;

/// Distinct job graphs that must agree before a round is accepted.
pub const MIN_REQUIRED_JOB_RESULTS: u32 = 2;

/// Asset half of the listing request.
#[derive(Debug, Clone)]
pub struct AssetSpec {
    pub base_symbol: String,
    pub base_mint: Pubkey,
    /// Rough current price, used only to size staking-pool quotes.
    pub token_price: f64,
    pub token_decimals: u8,
    /// The backing pool quotes in SOL rather than the USD stablecoin.
    pub sol_quoted: bool,
}

/// Emits complete job graphs for liquid-staking assets, whose pricing walks
/// the stake pool instead of a swap route.
pub trait StakePoolTemplates: Send + Sync {
    fn exact_in(&self, base_mint: &Pubkey, native_amount: u64, stake_pool: &Pubkey) -> OracleJob;
    fn exact_out(&self, base_mint: &Pubkey, native_amount: u64, stake_pool: &Pubkey) -> OracleJob;
}

/// Everything the network client needs to create and fund one feed.
#[derive(Debug, Clone)]
pub struct FeedDeployment {
    pub name: String,
    pub jobs: Vec<WeightedJob>,
    pub batch_size: u32,
    pub min_required_oracle_results: u32,
    pub min_required_job_results: u32,
    pub min_update_delay_seconds: u32,
    pub force_report_period_secs: u32,
    pub fund_amount_sol: f64,
    pub authority: Pubkey,
    pub withdraw_authority: Pubkey,
    pub queue: Pubkey,
    pub crank_pubkey: Pubkey,
    pub crank_data_buffer: Pubkey,
    pub sliding_window: bool,
    pub disable_crank: bool,
    pub base_priority_fee: u32,
    pub priority_fee_bump: u32,
    pub priority_fee_bump_period: u32,
    pub max_priority_fee_multiplier: u32,
}

impl FeedDeployment {
    pub fn validate(&self) -> FeedResult<()> {
        if self.min_required_job_results as usize > self.jobs.len() {
            return Err(FeedError::configuration(format!(
                "feed '{}' requires {} agreeing jobs but carries only {}",
                self.name,
                self.min_required_job_results,
                self.jobs.len(),
            )));
        }
        Ok(())
    }
}

/// Builds the weighted job pair for one listing.
pub fn assemble_jobs(
    env: &OracleEnv,
    settings: &TierSettings,
    asset: &AssetSpec,
    pool: &SelectedPool,
    is_reversed: bool,
    templates: Option<&dyn StakePoolTemplates>,
) -> FeedResult<Vec<WeightedJob>> {
    let (exact_in, exact_out) = match pool {
        SelectedPool::StakePool { address } => {
            let templates = templates.ok_or_else(|| {
                FeedError::configuration(
                    "staking-pool asset listed without stake pool templates",
                )
            })?;
            let native_amount = staking_quote_amount(&settings.swap_value, asset)?;
            (
                templates.exact_in(&asset.base_mint, native_amount, address),
                templates.exact_out(&asset.base_mint, native_amount, address),
            )
        }
        SelectedPool::Dex { kind, address } => {
            let primary = SwapQuoteSpec {
                base_mint: asset.base_mint,
                quote_mint: env.usdc_mint,
                swap_value: settings.swap_value.clone(),
            };
            let fallback = PoolFallbackSpec {
                dex: *kind,
                pool: *address,
                is_reversed,
                sol_reference_feed: env.sol_reference_feed.clone(),
                confidence_interval: env.feed.confidence_interval,
            };
            let usd = usd_normalization(env);
            (
                with_normalization(
                    price::build(PriceDirection::ExactIn, &primary, &fallback, asset.sol_quoted),
                    usd.clone(),
                ),
                with_normalization(
                    price::build(PriceDirection::ExactOut, &primary, &fallback, asset.sol_quoted),
                    usd,
                ),
            )
        }
    };
    Ok(vec![
        WeightedJob::new(1, exact_in),
        WeightedJob::new(1, exact_out),
    ])
}

/// Builds the full deployment for one listing.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    env: &OracleEnv,
    tier: &str,
    asset: &AssetSpec,
    pool: &SelectedPool,
    is_reversed: bool,
    queue: &QueueHandle,
    crank: &CrankHandle,
    authority: Pubkey,
    templates: Option<&dyn StakePoolTemplates>,
) -> FeedResult<FeedDeployment> {
    let settings = env.tier(tier)?;
    let jobs = assemble_jobs(env, settings, asset, pool, is_reversed, templates)?;
    let deployment = FeedDeployment {
        name: format!("{}/USD", asset.base_symbol),
        jobs,
        batch_size: settings.batch_size,
        min_required_oracle_results: settings.min_required_oracle_results,
        min_required_job_results: MIN_REQUIRED_JOB_RESULTS,
        min_update_delay_seconds: settings.min_update_delay_seconds,
        force_report_period_secs: env.feed.force_report_period_secs,
        fund_amount_sol: settings.fund_amount_sol,
        authority,
        withdraw_authority: env.feed_authority,
        queue: queue.pubkey,
        crank_pubkey: crank.pubkey,
        crank_data_buffer: crank.data_buffer,
        sliding_window: env.feed.sliding_window,
        disable_crank: env.feed.disable_crank,
        base_priority_fee: env.feed.base_priority_fee,
        priority_fee_bump: env.feed.priority_fee_bump,
        priority_fee_bump_period: env.feed.priority_fee_bump_period,
        max_priority_fee_multiplier: env.feed.max_priority_fee_multiplier,
    };
    deployment.validate()?;
    Ok(deployment)
}

/// Converts the stablecoin-denominated estimate into USD through the
/// reference feed, with the on-chain oracle as a last resort.
fn usd_normalization(env: &OracleEnv) -> Task {
    Task::conditional(
        vec![Task::multiply_by_job(OracleJob::single(Task::oracle_pyth(
            env.usd_reference_feed.clone(),
            env.feed.confidence_interval,
        )))],
        vec![Task::multiply_by_job(OracleJob::single(
            Task::oracle_switchboard(env.fallback_usd_oracle.to_string()),
        ))],
    )
}

fn with_normalization(mut job: OracleJob, normalization: Task) -> OracleJob {
    job.tasks.push(normalization);
    job
}

/// Sizes the staking-pool quote: the tier notional over the rough token
/// price, rounded up to whole tokens, in native units.
fn staking_quote_amount(swap_value: &str, asset: &AssetSpec) -> FeedResult<u64> {
    let notional: f64 = swap_value.parse().map_err(|_| {
        FeedError::configuration(format!("tier swap value '{swap_value}' is not numeric"))
    })?;
    if !asset.token_price.is_finite() || asset.token_price <= 0.0 {
        return Err(FeedError::configuration(
            "a positive token price is required to size staking-pool quotes",
        ));
    }
    let whole_tokens = (notional / asset.token_price).ceil();
    Ok((whole_tokens * 10f64.powi(i32::from(asset.token_decimals))) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedCtlConfig;
    use crate::pools::DexKind;
    use std::sync::Mutex;

    fn env() -> OracleEnv {
        OracleEnv::from_config(&FeedCtlConfig::default()).unwrap()
    }

    fn asset() -> AssetSpec {
        AssetSpec {
            base_symbol: "MNGO".to_string(),
            base_mint: Pubkey::new_unique(),
            token_price: 30.0,
            token_decimals: 9,
            sol_quoted: false,
        }
    }

    fn dex_pool() -> SelectedPool {
        SelectedPool::Dex {
            kind: DexKind::Orca,
            address: Pubkey::new_unique(),
        }
    }

    fn queue() -> QueueHandle {
        QueueHandle {
            pubkey: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
        }
    }

    fn crank() -> CrankHandle {
        CrankHandle {
            pubkey: Pubkey::new_unique(),
            data_buffer: Pubkey::new_unique(),
        }
    }

    struct FixtureTemplates {
        native_amounts: Mutex<Vec<u64>>,
    }

    impl FixtureTemplates {
        fn new() -> Self {
            Self {
                native_amounts: Mutex::new(Vec::new()),
            }
        }
    }

    impl StakePoolTemplates for FixtureTemplates {
        fn exact_in(
            &self,
            base_mint: &Pubkey,
            native_amount: u64,
            stake_pool: &Pubkey,
        ) -> OracleJob {
            self.native_amounts.lock().unwrap().push(native_amount);
            OracleJob::single(Task::value(format!("in:{base_mint}:{stake_pool}")))
        }

        fn exact_out(
            &self,
            base_mint: &Pubkey,
            native_amount: u64,
            stake_pool: &Pubkey,
        ) -> OracleJob {
            self.native_amounts.lock().unwrap().push(native_amount);
            OracleJob::single(Task::value(format!("out:{base_mint}:{stake_pool}")))
        }
    }

    #[test]
    fn test_every_tier_assembles_a_two_job_deployment() {
        let env = env();
        let asset = asset();
        let pool = dex_pool();
        for (tier, settings) in &env.tiers {
            let deployment = assemble(
                &env,
                tier,
                &asset,
                &pool,
                false,
                &queue(),
                &crank(),
                Pubkey::new_unique(),
                None,
            )
            .unwrap();
            assert_eq!(deployment.jobs.len(), 2, "tier {tier}");
            assert!(deployment.jobs.iter().all(|job| job.weight == 1));
            assert_eq!(deployment.min_required_job_results, 2);
            assert_eq!(deployment.batch_size, settings.batch_size);
            assert_eq!(
                deployment.min_required_oracle_results,
                settings.min_required_oracle_results
            );
            assert_eq!(
                deployment.min_update_delay_seconds,
                settings.min_update_delay_seconds
            );
            assert_eq!(deployment.fund_amount_sol, settings.fund_amount_sol);
        }
    }

    #[test]
    fn test_deployment_carries_env_and_handle_parameters() {
        let env = env();
        let queue = queue();
        let crank = crank();
        let authority = Pubkey::new_unique();
        let deployment = assemble(
            &env,
            "mid_wit",
            &asset(),
            &dex_pool(),
            false,
            &queue,
            &crank,
            authority,
            None,
        )
        .unwrap();

        assert_eq!(deployment.name, "MNGO/USD");
        assert_eq!(deployment.authority, authority);
        assert_eq!(deployment.withdraw_authority, env.feed_authority);
        assert_eq!(deployment.queue, queue.pubkey);
        assert_eq!(deployment.crank_pubkey, crank.pubkey);
        assert_eq!(deployment.crank_data_buffer, crank.data_buffer);
        assert_eq!(deployment.force_report_period_secs, 3600);
        assert_eq!(deployment.base_priority_fee, 1000);
        assert_eq!(deployment.priority_fee_bump, 1000);
        assert_eq!(deployment.priority_fee_bump_period, 10);
        assert_eq!(deployment.max_priority_fee_multiplier, 5);
        assert!(deployment.sliding_window);
        assert!(!deployment.disable_crank);
    }

    #[test]
    fn test_dex_jobs_end_with_usd_normalization() {
        let env = env();
        let settings = env.tier("blue_chip").unwrap();
        let jobs = assemble_jobs(&env, settings, &asset(), &dex_pool(), false, None).unwrap();

        for weighted in &jobs {
            let tail = serde_json::to_value(weighted.job.tasks.last()).unwrap();
            let conditional = &tail["conditionalTask"];
            let attempt = &conditional["attempt"][0]["multiplyTask"]["job"]["tasks"][0];
            assert_eq!(
                attempt["oracleTask"]["pythAddress"],
                env.usd_reference_feed
            );
            let fallback = &conditional["onFailure"][0]["multiplyTask"]["job"]["tasks"][0];
            assert_eq!(
                fallback["oracleTask"]["switchboardAddress"],
                env.fallback_usd_oracle.to_string()
            );
        }
    }

    #[test]
    fn test_staking_pool_jobs_come_verbatim_from_templates() {
        let env = env();
        let settings = env.tier("blue_chip").unwrap();
        let templates = FixtureTemplates::new();
        let pool = SelectedPool::StakePool {
            address: Pubkey::new_unique(),
        };
        let asset = asset();

        let jobs =
            assemble_jobs(&env, settings, &asset, &pool, false, Some(&templates)).unwrap();

        // blue_chip quotes 10000 at a price of 30: ceil to 334 whole tokens
        let native = 334_u64 * 1_000_000_000;
        assert_eq!(*templates.native_amounts.lock().unwrap(), vec![native, native]);
        // template output is not wrapped or extended
        assert_eq!(jobs[0].job.tasks.len(), 1);
        assert_eq!(jobs[1].job.tasks.len(), 1);
    }

    #[test]
    fn test_staking_pool_without_templates_is_rejected() {
        let env = env();
        let settings = env.tier("blue_chip").unwrap();
        let pool = SelectedPool::StakePool {
            address: Pubkey::new_unique(),
        };

        let err = assemble_jobs(&env, settings, &asset(), &pool, false, None).unwrap_err();
        assert!(err.to_string().contains("stake pool templates"));
    }

    #[test]
    fn test_unknown_tier_is_rejected() {
        let err = assemble(
            &env(),
            "platinum",
            &asset(),
            &dex_pool(),
            false,
            &queue(),
            &crank(),
            Pubkey::new_unique(),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown listing tier"));
    }

    #[test]
    fn test_non_numeric_swap_value_is_rejected_for_staking_pools() {
        let env = env();
        let mut settings = env.tier("meme").unwrap().clone();
        settings.swap_value = "lots".to_string();
        let templates = FixtureTemplates::new();
        let pool = SelectedPool::StakePool {
            address: Pubkey::new_unique(),
        };

        let err = assemble_jobs(&env, &settings, &asset(), &pool, false, Some(&templates))
            .unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn test_zero_token_price_is_rejected_for_staking_pools() {
        let env = env();
        let settings = env.tier("meme").unwrap();
        let templates = FixtureTemplates::new();
        let pool = SelectedPool::StakePool {
            address: Pubkey::new_unique(),
        };
        let mut asset = asset();
        asset.token_price = 0.0;

        let err = assemble_jobs(&env, settings, &asset, &pool, false, Some(&templates))
            .unwrap_err();
        assert!(err.to_string().contains("positive token price"));
    }

    #[test]
    fn test_validate_rejects_an_underfilled_deployment() {
        let env = env();
        let mut deployment = assemble(
            &env,
            "meme",
            &asset(),
            &dex_pool(),
            false,
            &queue(),
            &crank(),
            Pubkey::new_unique(),
            None,
        )
        .unwrap();
        deployment.jobs.truncate(1);

        assert!(deployment.validate().is_err());
    }
}
