//! Drives planned transaction groups through the ledger.
//!
//! Groups are signed once and submitted in plan order. Sequential groups
//! gate on the previous confirmation; adjacent parallel groups fly
//! together. Transport errors rotate through backup endpoints with jittered
//! exponential backoff, while an on-chain rejection is terminal for its
//! group. After a failure, every later sequential group is abandoned
//! unsent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use tokio::time::{interval, sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::SubmissionConfig;
use crate::errors::{FeedError, FeedResult};
use crate::planner::{SequenceKind, TransactionGroup};

/// Where a sent transaction currently stands at confirmed commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureDisposition {
    Pending,
    Confirmed,
    /// Landed and was rejected by the runtime.
    Failed(String),
}

/// One RPC endpoint the submitter can drive. Production uses
/// [`RpcEndpoint`]; tests substitute recording fakes.
#[async_trait]
pub trait LedgerEndpoint: Send + Sync {
    fn url(&self) -> &str;

    async fn latest_blockhash(&self) -> FeedResult<Hash>;

    async fn send_transaction(&self, transaction: &Transaction) -> FeedResult<Signature>;

    async fn signature_status(&self, signature: &Signature)
        -> FeedResult<SignatureDisposition>;
}

/// A JSON-RPC endpoint.
pub struct RpcEndpoint {
    url: String,
    client: RpcClient,
}

impl RpcEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let client = RpcClient::new(url.clone());
        Self { url, client }
    }
}

#[async_trait]
impl LedgerEndpoint for RpcEndpoint {
    fn url(&self) -> &str {
        &self.url
    }

    async fn latest_blockhash(&self) -> FeedResult<Hash> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|err| FeedError::network_lookup(format!("{}: {err}", self.url)))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> FeedResult<Signature> {
        self.client
            .send_transaction(transaction)
            .await
            .map_err(|err| FeedError::network_lookup(format!("{}: {err}", self.url)))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> FeedResult<SignatureDisposition> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, CommitmentConfig::confirmed())
            .await
            .map_err(|err| FeedError::network_lookup(format!("{}: {err}", self.url)))?;
        Ok(match status {
            None => SignatureDisposition::Pending,
            Some(Ok(())) => SignatureDisposition::Confirmed,
            Some(Err(err)) => SignatureDisposition::Failed(err.to_string()),
        })
    }
}

/// Retry and batching knobs, decoupled from the config file schema.
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    /// Send attempts per group, including the first. Zero is treated as one.
    pub max_retries: u32,
    /// Groups driven per batch.
    pub max_groups_per_batch: usize,
    pub confirm_timeout: Duration,
    pub confirm_poll: Duration,
    pub retry_base_backoff: Duration,
    pub retry_max_backoff: Duration,
    /// Jitter factor (0.0 to 1.0) applied to retry backoff.
    pub retry_jitter: f64,
}

impl From<&SubmissionConfig> for SubmitterConfig {
    fn from(config: &SubmissionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_groups_per_batch: config.max_groups_per_batch,
            confirm_timeout: Duration::from_millis(config.confirm_timeout_ms),
            confirm_poll: Duration::from_millis(config.confirm_poll_ms),
            retry_base_backoff: Duration::from_millis(config.retry_base_backoff_ms),
            retry_max_backoff: Duration::from_millis(config.retry_max_backoff_ms),
            retry_jitter: config.retry_jitter,
        }
    }
}

/// Terminal state of one planned group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Confirmed { signature: Signature },
    /// Rejected by the runtime; identical bytes cannot land later.
    Failed { reason: String },
    /// Retries exhausted without a terminal status, or skipped after an
    /// earlier sequential failure.
    Abandoned,
}

impl SubmissionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// Outcome of a single send-and-confirm attempt against one endpoint.
enum Attempt {
    Confirmed,
    Rejected(String),
    Errored(String),
}

/// Submits planned groups in order with retry and endpoint failover.
pub struct BatchSubmitter {
    endpoints: Vec<Arc<dyn LedgerEndpoint>>,
    payer: Arc<Keypair>,
    config: SubmitterConfig,
}

impl BatchSubmitter {
    pub fn new(
        endpoints: Vec<Arc<dyn LedgerEndpoint>>,
        payer: Arc<Keypair>,
        config: SubmitterConfig,
    ) -> FeedResult<Self> {
        if endpoints.is_empty() {
            return Err(FeedError::configuration(
                "submitter requires at least one endpoint",
            ));
        }
        Ok(Self {
            endpoints,
            payer,
            config,
        })
    }

    /// Builds the production submitter: the primary endpoint followed by
    /// the configured backups.
    pub fn from_submission_config(
        config: &SubmissionConfig,
        payer: Arc<Keypair>,
    ) -> FeedResult<Self> {
        let mut endpoints: Vec<Arc<dyn LedgerEndpoint>> =
            vec![Arc::new(RpcEndpoint::new(config.rpc_url.clone()))];
        for url in &config.backup_rpc_urls {
            endpoints.push(Arc::new(RpcEndpoint::new(url.clone())));
        }
        Self::new(endpoints, payer, SubmitterConfig::from(config))
    }

    pub fn payer_pubkey(&self) -> Pubkey {
        self.payer.pubkey()
    }

    /// Submits every group, returning one outcome per group in plan order.
    pub async fn submit(
        &self,
        groups: &[TransactionGroup],
    ) -> FeedResult<Vec<SubmissionOutcome>> {
        let batch_bound = self.config.max_groups_per_batch.max(1);
        let mut outcomes: Vec<SubmissionOutcome> = Vec::with_capacity(groups.len());
        let mut halted = false;

        for (batch_index, batch) in groups.chunks(batch_bound).enumerate() {
            let offset = batch_index * batch_bound;
            debug!(batch = batch_index, groups = batch.len(), "submitting batch");

            let mut pending = batch.iter().enumerate().peekable();
            while let Some((index, group)) = pending.next() {
                let group_index = offset + index;
                if halted {
                    warn!(group = group_index, "abandoned after earlier failure");
                    outcomes.push(SubmissionOutcome::Abandoned);
                    continue;
                }
                match group.sequence {
                    SequenceKind::Sequential => {
                        let outcome = self.submit_group(group_index, group).await;
                        halted = !outcome.is_confirmed();
                        outcomes.push(outcome);
                    }
                    SequenceKind::Parallel => {
                        let mut run = vec![(group_index, group)];
                        while let Some((next_index, next_group)) = pending
                            .next_if(|(_, later)| later.sequence == SequenceKind::Parallel)
                        {
                            run.push((offset + next_index, next_group));
                        }
                        let results = join_all(
                            run.iter().map(|(i, member)| self.submit_group(*i, member)),
                        )
                        .await;
                        halted = results.iter().any(|outcome| !outcome.is_confirmed());
                        outcomes.extend(results);
                    }
                }
            }
        }
        Ok(outcomes)
    }

    async fn submit_group(
        &self,
        group_index: usize,
        group: &TransactionGroup,
    ) -> SubmissionOutcome {
        let transaction = match self.sign_group(group_index, group).await {
            Ok(transaction) => transaction,
            Err(err) => {
                warn!(group = group_index, error = %err, "failed to sign group");
                return SubmissionOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };
        let signature = transaction.signatures[0];

        let mut last_failure = String::new();
        // at least one send even with a zero retry budget
        for attempt in 0..self.config.max_retries.max(1) {
            let endpoint = &self.endpoints[attempt as usize % self.endpoints.len()];
            if attempt > 0 {
                let delay = self.backoff_delay(attempt - 1);
                debug!(
                    group = group_index,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    endpoint = endpoint.url(),
                    "retrying group"
                );
                sleep(delay).await;
            }
            match self.attempt(endpoint.as_ref(), &transaction, &signature).await {
                Attempt::Confirmed => {
                    info!(
                        group = group_index,
                        %signature,
                        endpoint = endpoint.url(),
                        "group confirmed"
                    );
                    return SubmissionOutcome::Confirmed { signature };
                }
                Attempt::Rejected(reason) => {
                    warn!(group = group_index, %signature, reason = %reason, "group rejected");
                    return SubmissionOutcome::Failed { reason };
                }
                Attempt::Errored(reason) => {
                    debug!(
                        group = group_index,
                        endpoint = endpoint.url(),
                        reason = %reason,
                        "attempt errored"
                    );
                    last_failure = reason;
                }
            }
        }
        warn!(
            group = group_index,
            %signature,
            last_failure = %last_failure,
            "group abandoned after retries"
        );
        SubmissionOutcome::Abandoned
    }

    /// Signs the group once; retries resend the identical bytes so the
    /// ledger can deduplicate.
    async fn sign_group(
        &self,
        group_index: usize,
        group: &TransactionGroup,
    ) -> FeedResult<Transaction> {
        let blockhash = self.fetch_blockhash().await?;
        let instructions = group.instructions();
        let message = Message::new(&instructions, Some(&self.payer.pubkey()));
        let mut transaction = Transaction::new_unsigned(message);

        let mut signers: Vec<&dyn Signer> = Vec::with_capacity(group.signers.len() + 1);
        signers.push(self.payer.as_ref());
        for keypair in &group.signers {
            signers.push(keypair.as_ref());
        }
        transaction
            .try_sign(&signers, blockhash)
            .map_err(|err| FeedError::submission(group_index, format!("signing failed: {err}")))?;
        Ok(transaction)
    }

    async fn fetch_blockhash(&self) -> FeedResult<Hash> {
        let mut last_error = None;
        for endpoint in &self.endpoints {
            match endpoint.latest_blockhash().await {
                Ok(blockhash) => return Ok(blockhash),
                Err(err) => {
                    debug!(endpoint = endpoint.url(), error = %err, "blockhash fetch failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| FeedError::network_lookup("no endpoints configured")))
    }

    /// One send followed by a confirmation poll against a single endpoint.
    async fn attempt(
        &self,
        endpoint: &dyn LedgerEndpoint,
        transaction: &Transaction,
        signature: &Signature,
    ) -> Attempt {
        if let Err(err) = endpoint.send_transaction(transaction).await {
            return Attempt::Errored(err.to_string());
        }

        let deadline = Instant::now() + self.config.confirm_timeout;
        // a zero poll period would busy-spin
        let mut poll = interval(self.config.confirm_poll.max(Duration::from_millis(1)));
        loop {
            poll.tick().await;
            match endpoint.signature_status(signature).await {
                Ok(SignatureDisposition::Confirmed) => return Attempt::Confirmed,
                Ok(SignatureDisposition::Failed(reason)) => {
                    return Attempt::Rejected(format!(
                        "transaction {signature} failed on chain: {reason}"
                    ));
                }
                Ok(SignatureDisposition::Pending) => {}
                Err(err) => return Attempt::Errored(err.to_string()),
            }
            if Instant::now() >= deadline {
                return Attempt::Errored(format!(
                    "confirmation timed out after {:?}",
                    self.config.confirm_timeout
                ));
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.retry_base_backoff.as_millis() as f64;
        let cap = self.config.retry_max_backoff.as_millis() as f64;
        let capped = (base * 2_f64.powi(attempt as i32)).min(cap);

        let jitter_range = capped * self.config.retry_jitter;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// Converts an outcome set into the pipeline error that tells the operator
/// where submission stopped, or passes when every group confirmed.
pub fn ensure_all_confirmed(outcomes: &[SubmissionOutcome]) -> FeedResult<()> {
    let confirmed = outcomes
        .iter()
        .take_while(|outcome| outcome.is_confirmed())
        .count();
    if confirmed == outcomes.len() {
        return Ok(());
    }
    let reason = outcomes[confirmed..]
        .iter()
        .find_map(|outcome| match outcome {
            SubmissionOutcome::Failed { reason } => Some(reason.clone()),
            SubmissionOutcome::Abandoned => {
                Some("retries exhausted without confirmation".to_string())
            }
            SubmissionOutcome::Confirmed { .. } => None,
        })
        .unwrap_or_else(|| "submission incomplete".to_string());

    if confirmed == 0 {
        Err(FeedError::submission(0, reason))
    } else {
        Err(FeedError::PartialCompletion {
            confirmed,
            total: outcomes.len(),
            reason,
        })
    }
}
