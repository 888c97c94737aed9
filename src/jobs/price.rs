//! Builds the conditional price graph for one quote direction.
//!
//! The primary branch prices the asset through the swap aggregator for a
//! tier-sized notional; the fallback branch reads the exchange rate straight
//! from the backing pool, inverted when the pool stores the pair reversed
//! and re-based to USD when the pool quotes in SOL.

use solana_sdk::pubkey::Pubkey;

use crate::jobs::task::{OracleJob, Task};
use crate::pools::DexKind;

/// Variable name the exact-out graph stores its quoted quantity under.
const QTY_VAR: &str = "QTY";
/// Reference expression resolving to [`QTY_VAR`] at evaluation time.
const QTY_REF: &str = "${QTY}";

/// Which side of the aggregator quote anchors the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDirection {
    /// Spend a fixed USD notional, divide by the tokens received.
    ExactIn,
    /// Buy back the received quantity, divide the proceeds by it.
    ExactOut,
}

/// Aggregator quote parameters shared by both directions.
#[derive(Debug, Clone)]
pub struct SwapQuoteSpec {
    pub base_mint: Pubkey,
    /// Mint the notional is denominated in. Always the USD stablecoin.
    pub quote_mint: Pubkey,
    /// Tier-sized notional, in quote-token decimal units.
    pub swap_value: String,
}

/// Pool-rate fallback parameters.
#[derive(Debug, Clone)]
pub struct PoolFallbackSpec {
    pub dex: DexKind,
    pub pool: Pubkey,
    /// Pool stores base and quote swapped, so the rate must be inverted.
    pub is_reversed: bool,
    /// SOL/USD feed id used to re-base SOL-quoted pools.
    pub sol_reference_feed: String,
    pub confidence_interval: f64,
}

/// Assembles one job graph: a single conditional whose attempt prices via
/// the aggregator and whose failure branch falls back to the pool rate.
pub fn build(
    direction: PriceDirection,
    primary: &SwapQuoteSpec,
    fallback: &PoolFallbackSpec,
    is_native_asset: bool,
) -> OracleJob {
    OracleJob::single(Task::conditional(
        attempt_tasks(direction, primary),
        fallback_tasks(fallback, is_native_asset),
    ))
}

fn attempt_tasks(direction: PriceDirection, primary: &SwapQuoteSpec) -> Vec<Task> {
    let base = primary.base_mint.to_string();
    let quote = primary.quote_mint.to_string();
    match direction {
        // price = notional / tokens bought with it
        PriceDirection::ExactIn => vec![
            Task::value(primary.swap_value.clone()),
            Task::divide_by_job(OracleJob::single(Task::jupiter_swap(
                quote,
                base,
                primary.swap_value.clone(),
            ))),
        ],
        // price = proceeds of selling QTY back / QTY
        PriceDirection::ExactOut => vec![
            Task::cache(
                QTY_VAR,
                OracleJob::single(Task::jupiter_swap(
                    quote.clone(),
                    base.clone(),
                    primary.swap_value.clone(),
                )),
            ),
            Task::jupiter_swap(base, quote, QTY_REF),
            Task::divide_by_big(QTY_REF),
        ],
    }
}

fn fallback_tasks(fallback: &PoolFallbackSpec, is_native_asset: bool) -> Vec<Task> {
    let rate = pool_rate_task(fallback);
    let mut tasks = if fallback.is_reversed {
        vec![Task::value("1"), Task::divide_by_job(OracleJob::single(rate))]
    } else {
        vec![rate]
    };
    if is_native_asset {
        tasks.push(Task::multiply_by_job(OracleJob::single(Task::oracle_pyth(
            fallback.sol_reference_feed.clone(),
            fallback.confidence_interval,
        ))));
    }
    tasks
}

fn pool_rate_task(fallback: &PoolFallbackSpec) -> Task {
    let pool = fallback.pool.to_string();
    match fallback.dex {
        DexKind::Orca => Task::lp_exchange_rate_orca(pool),
        DexKind::Raydium => Task::lp_exchange_rate_raydium(pool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn primary() -> SwapQuoteSpec {
        SwapQuoteSpec {
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            swap_value: "2000".to_string(),
        }
    }

    fn fallback(dex: DexKind, is_reversed: bool) -> PoolFallbackSpec {
        PoolFallbackSpec {
            dex,
            pool: Pubkey::new_unique(),
            is_reversed,
            sol_reference_feed: "ef0d8b6f".to_string(),
            confidence_interval: 10.0,
        }
    }

    fn as_json(job: &OracleJob) -> serde_json::Value {
        serde_json::to_value(job).unwrap()
    }

    #[test]
    fn test_exact_in_graph_shape() {
        let primary = primary();
        let fallback = fallback(DexKind::Orca, false);
        let job = build(PriceDirection::ExactIn, &primary, &fallback, false);

        let got = as_json(&job);
        let want = json!({
            "tasks": [{
                "conditionalTask": {
                    "attempt": [
                        { "valueTask": { "big": "2000" } },
                        { "divideTask": { "job": { "tasks": [{
                            "jupiterSwapTask": {
                                "inTokenAddress": primary.quote_mint.to_string(),
                                "outTokenAddress": primary.base_mint.to_string(),
                                "baseAmountString": "2000",
                            }
                        }] } } },
                    ],
                    "onFailure": [
                        { "lpExchangeRateTask": {
                            "orcaPoolAddress": fallback.pool.to_string(),
                        } },
                    ],
                }
            }]
        });
        assert_eq!(got, want);
    }

    #[test]
    fn test_exact_out_buys_back_the_cached_quantity() {
        let primary = primary();
        let fallback = fallback(DexKind::Raydium, false);
        let job = build(PriceDirection::ExactOut, &primary, &fallback, false);

        let tasks = &as_json(&job)["tasks"][0]["conditionalTask"]["attempt"];
        let cache = &tasks[0]["cacheTask"]["cacheItems"][0];
        assert_eq!(cache["variableName"], "QTY");
        assert_eq!(
            cache["job"]["tasks"][0]["jupiterSwapTask"]["inTokenAddress"],
            primary.quote_mint.to_string()
        );

        let sell = &tasks[1]["jupiterSwapTask"];
        assert_eq!(sell["inTokenAddress"], primary.base_mint.to_string());
        assert_eq!(sell["outTokenAddress"], primary.quote_mint.to_string());
        assert_eq!(sell["baseAmountString"], "${QTY}");

        assert_eq!(tasks[2]["divideTask"]["big"], "${QTY}");
    }

    #[test]
    fn test_reversed_pool_inverts_the_rate() {
        let primary = primary();
        let fallback = fallback(DexKind::Raydium, true);
        let job = build(PriceDirection::ExactIn, &primary, &fallback, false);

        let on_failure = &as_json(&job)["tasks"][0]["conditionalTask"]["onFailure"];
        assert_eq!(on_failure[0]["valueTask"]["big"], "1");
        assert_eq!(
            on_failure[1]["divideTask"]["job"]["tasks"][0]["lpExchangeRateTask"]
                ["raydiumPoolAddress"],
            fallback.pool.to_string()
        );
        assert_eq!(on_failure.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_native_asset_rebases_the_fallback_through_sol_usd() {
        let primary = primary();
        let fallback = fallback(DexKind::Orca, false);
        let job = build(PriceDirection::ExactIn, &primary, &fallback, true);

        let on_failure = &as_json(&job)["tasks"][0]["conditionalTask"]["onFailure"];
        let rebase = &on_failure[1]["multiplyTask"]["job"]["tasks"][0]["oracleTask"];
        assert_eq!(rebase["pythAddress"], "ef0d8b6f");
        assert_eq!(rebase["pythAllowedConfidenceInterval"], 10.0);
    }

    #[test]
    fn test_reversed_native_combines_inversion_then_rebase() {
        let primary = primary();
        let fallback = fallback(DexKind::Orca, true);
        let job = build(PriceDirection::ExactOut, &primary, &fallback, true);

        let on_failure = &as_json(&job)["tasks"][0]["conditionalTask"]["onFailure"];
        let names: Vec<&str> = on_failure
            .as_array()
            .unwrap()
            .iter()
            .map(|task| {
                task.as_object()
                    .unwrap()
                    .keys()
                    .next()
                    .unwrap()
                    .as_str()
            })
            .collect();
        assert_eq!(names, ["valueTask", "divideTask", "multiplyTask"]);
    }

    #[test]
    fn test_non_reversed_plain_fallback_is_a_single_task() {
        let primary = primary();
        let fallback = fallback(DexKind::Raydium, false);
        let job = build(PriceDirection::ExactIn, &primary, &fallback, false);

        let on_failure = &as_json(&job)["tasks"][0]["conditionalTask"]["onFailure"];
        assert_eq!(on_failure.as_array().unwrap().len(), 1);
        assert!(on_failure[0].get("lpExchangeRateTask").is_some());
    }
}
