//! Configuration for the feed deployment pipeline.
//!
//! All knobs load from a TOML file with per-field defaults, so an empty file
//! (or no file at all) yields the standard mainnet setup. Addresses live in
//! the file as strings and are parsed once into [`OracleEnv`], the immutable
//! record handed to the builders.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::errors::{FeedError, FeedResult};
use crate::planner::PlannerOptions;

/// Top-level file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCtlConfig {
    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub feed: FeedTuning,

    /// Listing tier -> settings profile. Fully overridable; the built-in
    /// table ships the four standard tiers.
    #[serde(default = "default_tiers")]
    pub tiers: BTreeMap<String, TierSettings>,
}

impl Default for FeedCtlConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            submission: SubmissionConfig::default(),
            planner: PlannerConfig::default(),
            feed: FeedTuning::default(),
            tiers: default_tiers(),
        }
    }
}

/// Oracle network addresses and reference feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_cluster")]
    pub cluster: String,

    /// Permissionless oracle queue the feed joins.
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Permissionless crank that schedules feed refreshes.
    #[serde(default = "default_crank")]
    pub crank: String,

    /// Pyth SOL/USD price feed id (hex), used to normalize SOL-quoted pools.
    #[serde(default = "default_sol_reference_feed")]
    pub sol_reference_feed: String,

    /// Pyth USDC/USD price feed id (hex), primary leg of USD normalization.
    #[serde(default = "default_usd_reference_feed")]
    pub usd_reference_feed: String,

    /// On-chain oracle backing the fallback leg of USD normalization.
    #[serde(default = "default_fallback_usd_oracle")]
    pub fallback_usd_oracle: String,

    /// Authority the feed is handed to after creation; also the withdraw
    /// authority baked into the deployment.
    #[serde(default = "default_feed_authority")]
    pub feed_authority: String,

    #[serde(default = "default_usdc_mint")]
    pub usdc_mint: String,

    #[serde(default = "default_wrapped_sol_mint")]
    pub wrapped_sol_mint: String,

    /// `{cluster}` and `{feed}` are substituted when building explorer links.
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            cluster: default_cluster(),
            queue: default_queue(),
            crank: default_crank(),
            sol_reference_feed: default_sol_reference_feed(),
            usd_reference_feed: default_usd_reference_feed(),
            fallback_usd_oracle: default_fallback_usd_oracle(),
            feed_authority: default_feed_authority(),
            usdc_mint: default_usdc_mint(),
            wrapped_sol_mint: default_wrapped_sol_mint(),
            explorer_url: default_explorer_url(),
        }
    }
}

/// Transaction submission behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Failover endpoints tried round-robin after the primary.
    #[serde(default)]
    pub backup_rpc_urls: Vec<String>,

    /// Send attempts per transaction group.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Groups per submission batch.
    #[serde(default = "default_max_groups_per_batch")]
    pub max_groups_per_batch: usize,

    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,

    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,

    #[serde(default = "default_retry_base_backoff_ms")]
    pub retry_base_backoff_ms: u64,

    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,

    /// Jitter factor (0.0 to 1.0) applied to retry backoff.
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: f64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            backup_rpc_urls: Vec::new(),
            max_retries: default_max_retries(),
            max_groups_per_batch: default_max_groups_per_batch(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            confirm_poll_ms: default_confirm_poll_ms(),
            retry_base_backoff_ms: default_retry_base_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
            retry_jitter: default_retry_jitter(),
        }
    }
}

/// Instruction grouping behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Payload instructions per transaction group. One keeps every group
    /// comfortably inside per-transaction resource limits.
    #[serde(default = "default_max_instructions_per_group")]
    pub max_instructions_per_group: usize,

    /// Micro-lamports written into each group's compute budget prologue.
    #[serde(default = "default_compute_unit_price")]
    pub compute_unit_price_micro_lamports: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_instructions_per_group: default_max_instructions_per_group(),
            compute_unit_price_micro_lamports: default_compute_unit_price(),
        }
    }
}

/// Feed parameters that do not vary per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedTuning {
    #[serde(default = "default_force_report_period")]
    pub force_report_period_secs: u32,

    /// Confidence-interval tolerance for price-feed lookups.
    #[serde(default = "default_confidence_interval")]
    pub confidence_interval: f64,

    #[serde(default = "default_base_priority_fee")]
    pub base_priority_fee: u32,

    #[serde(default = "default_priority_fee_bump")]
    pub priority_fee_bump: u32,

    #[serde(default = "default_priority_fee_bump_period")]
    pub priority_fee_bump_period: u32,

    #[serde(default = "default_max_priority_fee_multiplier")]
    pub max_priority_fee_multiplier: u32,

    #[serde(default = "default_true")]
    pub sliding_window: bool,

    #[serde(default)]
    pub disable_crank: bool,
}

impl Default for FeedTuning {
    fn default() -> Self {
        Self {
            force_report_period_secs: default_force_report_period(),
            confidence_interval: default_confidence_interval(),
            base_priority_fee: default_base_priority_fee(),
            priority_fee_bump: default_priority_fee_bump(),
            priority_fee_bump_period: default_priority_fee_bump_period(),
            max_priority_fee_multiplier: default_max_priority_fee_multiplier(),
            sliding_window: default_true(),
            disable_crank: false,
        }
    }
}

/// Per-tier feed economics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSettings {
    pub batch_size: u32,
    pub min_required_oracle_results: u32,
    pub min_update_delay_seconds: u32,
    pub fund_amount_sol: f64,
    /// Aggregator quote notional, a decimal string as the task schema expects.
    pub swap_value: String,
}

// Default value functions
fn default_cluster() -> String {
    "mainnet".to_string()
}
fn default_queue() -> String {
    "5JYwqvKkqp35w8Nq3ba4z1WYUeJQ1rB36V8XvaGp6zn1".to_string()
}
fn default_crank() -> String {
    "BKtF8yyQsj3Ft6jb2nkfpEKzARZVdGgdEPs6mFmZNmbA".to_string()
}
fn default_sol_reference_feed() -> String {
    "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d".to_string()
}
fn default_usd_reference_feed() -> String {
    "eaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a".to_string()
}
fn default_fallback_usd_oracle() -> String {
    "FwYfsmj5x8YZXtQBNo2Cz8TE7WRCMFqA6UTffK4xQKMH".to_string()
}
fn default_feed_authority() -> String {
    "5tgfd6XgwiXB9otEnzFpXK11m7Q7yZUaAJzWK4oT5UGF".to_string()
}
fn default_usdc_mint() -> String {
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string()
}
fn default_wrapped_sol_mint() -> String {
    "So11111111111111111111111111111111111111112".to_string()
}
fn default_explorer_url() -> String {
    "https://app.switchboard.xyz/solana/{cluster}/feed/{feed}".to_string()
}
fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_max_groups_per_batch() -> usize {
    20
}
fn default_confirm_timeout_ms() -> u64 {
    30_000
}
fn default_confirm_poll_ms() -> u64 {
    500
}
fn default_retry_base_backoff_ms() -> u64 {
    200
}
fn default_retry_max_backoff_ms() -> u64 {
    5_000
}
fn default_retry_jitter() -> f64 {
    0.2
}
fn default_max_instructions_per_group() -> usize {
    1
}
fn default_compute_unit_price() -> u64 {
    80_000
}
fn default_force_report_period() -> u32 {
    3_600
}
fn default_confidence_interval() -> f64 {
    10.0
}
fn default_base_priority_fee() -> u32 {
    1_000
}
fn default_priority_fee_bump() -> u32 {
    1_000
}
fn default_priority_fee_bump_period() -> u32 {
    10
}
fn default_max_priority_fee_multiplier() -> u32 {
    5
}
fn default_true() -> bool {
    true
}

fn default_tiers() -> BTreeMap<String, TierSettings> {
    BTreeMap::from([
        (
            "blue_chip".to_string(),
            TierSettings {
                batch_size: 6,
                min_required_oracle_results: 3,
                min_update_delay_seconds: 6,
                fund_amount_sol: 2.0,
                swap_value: "10000".to_string(),
            },
        ),
        (
            "mid_wit".to_string(),
            TierSettings {
                batch_size: 5,
                min_required_oracle_results: 3,
                min_update_delay_seconds: 20,
                fund_amount_sol: 1.0,
                swap_value: "2000".to_string(),
            },
        ),
        (
            "meme".to_string(),
            TierSettings {
                batch_size: 5,
                min_required_oracle_results: 2,
                min_update_delay_seconds: 60,
                fund_amount_sol: 0.6,
                swap_value: "500".to_string(),
            },
        ),
        (
            "untrusted".to_string(),
            TierSettings {
                batch_size: 3,
                min_required_oracle_results: 2,
                min_update_delay_seconds: 300,
                fund_amount_sol: 0.1,
                swap_value: "100".to_string(),
            },
        ),
    ])
}

impl FeedCtlConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// A missing file falls back to the built-in defaults so read-only
    /// commands work without any setup.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Parsed, validated form of the configuration. Built once at startup and
/// passed by reference into the builders; there is no global state.
#[derive(Debug, Clone)]
pub struct OracleEnv {
    pub cluster: String,
    pub queue: Pubkey,
    pub crank: Pubkey,
    pub sol_reference_feed: String,
    pub usd_reference_feed: String,
    pub fallback_usd_oracle: Pubkey,
    pub feed_authority: Pubkey,
    pub usdc_mint: Pubkey,
    pub wrapped_sol_mint: Pubkey,
    pub explorer_url: String,
    pub feed: FeedTuning,
    pub planner: PlannerOptions,
    pub tiers: BTreeMap<String, TierSettings>,
}

impl OracleEnv {
    pub fn from_config(config: &FeedCtlConfig) -> FeedResult<Self> {
        Ok(Self {
            cluster: config.oracle.cluster.clone(),
            queue: parse_pubkey("oracle.queue", &config.oracle.queue)?,
            crank: parse_pubkey("oracle.crank", &config.oracle.crank)?,
            sol_reference_feed: config.oracle.sol_reference_feed.clone(),
            usd_reference_feed: config.oracle.usd_reference_feed.clone(),
            fallback_usd_oracle: parse_pubkey(
                "oracle.fallback_usd_oracle",
                &config.oracle.fallback_usd_oracle,
            )?,
            feed_authority: parse_pubkey("oracle.feed_authority", &config.oracle.feed_authority)?,
            usdc_mint: parse_pubkey("oracle.usdc_mint", &config.oracle.usdc_mint)?,
            wrapped_sol_mint: parse_pubkey(
                "oracle.wrapped_sol_mint",
                &config.oracle.wrapped_sol_mint,
            )?,
            explorer_url: config.oracle.explorer_url.clone(),
            feed: config.feed.clone(),
            planner: PlannerOptions {
                max_instructions_per_group: config.planner.max_instructions_per_group,
                compute_unit_price: config.planner.compute_unit_price_micro_lamports,
            },
            tiers: config.tiers.clone(),
        })
    }

    /// Settings profile for `tier`, or a configuration error naming it.
    pub fn tier(&self, tier: &str) -> FeedResult<&TierSettings> {
        self.tiers
            .get(tier)
            .ok_or_else(|| FeedError::configuration(format!("unknown listing tier '{tier}'")))
    }

    /// Mint the selected pool quotes against. The pool-reversal check
    /// compares the pool's base mint to this; aggregator legs always
    /// quote in USDC regardless.
    pub fn quote_mint(&self, sol_quoted: bool) -> Pubkey {
        if sol_quoted {
            self.wrapped_sol_mint
        } else {
            self.usdc_mint
        }
    }

    pub fn explorer_url(&self, feed: &Pubkey) -> String {
        self.explorer_url
            .replace("{cluster}", &self.cluster)
            .replace("{feed}", &feed.to_string())
    }
}

fn parse_pubkey(field: &str, value: &str) -> FeedResult<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|err| FeedError::configuration(format!("{field}: invalid address '{value}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_parse_into_env() {
        let config = FeedCtlConfig::default();
        let env = OracleEnv::from_config(&config).unwrap();
        assert_eq!(env.cluster, "mainnet");
        assert_eq!(env.planner.max_instructions_per_group, 1);
        assert_eq!(env.planner.compute_unit_price, 80_000);
        assert_eq!(env.feed.force_report_period_secs, 3_600);
        assert_eq!(config.submission.max_retries, 5);
        assert_eq!(config.submission.max_groups_per_batch, 20);
        assert_eq!(env.tiers.len(), 4);
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: FeedCtlConfig = toml::from_str("").unwrap();
        assert_eq!(config.submission.max_retries, 5);
        assert_eq!(config.planner.max_instructions_per_group, 1);
        assert!(config.tiers.contains_key("untrusted"));
    }

    #[test]
    fn test_file_overrides_take_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[submission]
rpc_url = "http://localhost:8899"
backup_rpc_urls = ["http://localhost:8900"]
max_retries = 2

[planner]
max_instructions_per_group = 3

[tiers.custom]
batch_size = 4
min_required_oracle_results = 2
min_update_delay_seconds = 120
fund_amount_sol = 0.5
swap_value = "250"
"#
        )
        .unwrap();

        let config = FeedCtlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.submission.rpc_url, "http://localhost:8899");
        assert_eq!(config.submission.backup_rpc_urls.len(), 1);
        assert_eq!(config.submission.max_retries, 2);
        assert_eq!(config.planner.max_instructions_per_group, 3);
        // overriding [tiers] replaces the whole table
        assert_eq!(config.tiers.len(), 1);
        assert_eq!(config.tiers["custom"].swap_value, "250");
    }

    #[test]
    fn test_bad_address_is_a_configuration_error() {
        let mut config = FeedCtlConfig::default();
        config.oracle.queue = "not-an-address".to_string();
        let err = OracleEnv::from_config(&config).unwrap_err();
        assert_eq!(err.category(), "configuration");
        assert!(err.to_string().contains("oracle.queue"));
    }

    #[test]
    fn test_unknown_tier_is_a_configuration_error() {
        let env = OracleEnv::from_config(&FeedCtlConfig::default()).unwrap();
        let err = env.tier("T9").unwrap_err();
        assert_eq!(err.category(), "configuration");
        assert!(err.to_string().contains("T9"));
    }

    #[test]
    fn test_quote_mint_tracks_denomination() {
        let env = OracleEnv::from_config(&FeedCtlConfig::default()).unwrap();
        assert_eq!(env.quote_mint(false), env.usdc_mint);
        assert_eq!(env.quote_mint(true), env.wrapped_sol_mint);
    }

    #[test]
    fn test_explorer_url_substitutes_placeholders() {
        let env = OracleEnv::from_config(&FeedCtlConfig::default()).unwrap();
        let feed = Pubkey::new_unique();
        let url = env.explorer_url(&feed);
        assert!(url.contains("/mainnet/"));
        assert!(url.ends_with(&feed.to_string()));
    }
}
