//! Test Utilities Module
//!
//! Recording fakes for the network seams: ledger endpoints, the oracle
//! program client, pool inspection, staking-pool templates, and
//! notifications. Everything is deterministic and records what it saw so
//! tests can assert on ordering and arguments.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

use crate::errors::{FeedError, FeedResult};
use crate::jobs::assembler::{FeedDeployment, StakePoolTemplates};
use crate::jobs::task::{OracleJob, Task};
use crate::notify::{NotifyEvent, Notifier};
use crate::oracle::{
    CrankHandle, FeedHandle, InstructionBundle, OracleNetworkClient, QueueHandle,
};
use crate::pools::{DexKind, PoolInspector};
use crate::submitter::{LedgerEndpoint, SignatureDisposition};

/// Marker bytes the fake oracle client stamps into its instructions, so
/// tests can recognize them after planning and submission.
pub const MARKER_CREATE_FEED: u8 = 10;
pub const MARKER_FUND_LEASE: u8 = 11;
pub const MARKER_LOCK_FEED: u8 = 20;
pub const MARKER_SET_AUTHORITY: u8 = 30;

/// A one-byte payload instruction whose accounts mark `signers` as signers.
pub fn marker_instruction(marker: u8, signers: &[Pubkey]) -> Instruction {
    let accounts = signers
        .iter()
        .map(|pubkey| AccountMeta::new_readonly(*pubkey, true))
        .collect();
    Instruction::new_with_bytes(Pubkey::new_unique(), &[marker], accounts)
}

/// What one fake endpoint observed, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Sent {
        endpoint: String,
        marker: u8,
        signatures: usize,
    },
    Confirmed {
        marker: u8,
    },
}

pub type SharedEvents = Arc<Mutex<Vec<LedgerEvent>>>;

pub fn shared_events() -> SharedEvents {
    Arc::new(Mutex::new(Vec::new()))
}

/// How a [`FakeEndpoint`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeMode {
    /// Accepts sends; the first status poll confirms.
    Confirm,
    /// Every send fails at the transport layer.
    FailSend,
    /// Blockhash fetches fail; sends confirm normally.
    FailBlockhash,
    /// Accepts sends; the status poll reports an on-chain failure.
    RejectOnChain,
    /// Accepts sends; the status poll never leaves pending.
    NeverConfirm,
}

/// In-memory [`LedgerEndpoint`] that records traffic into a shared event
/// log, letting tests assert cross-endpoint ordering.
pub struct FakeEndpoint {
    url: String,
    mode: FakeMode,
    events: SharedEvents,
    markers: Mutex<HashMap<Signature, u8>>,
    sends: AtomicU32,
}

impl FakeEndpoint {
    pub fn new(url: &str, mode: FakeMode, events: SharedEvents) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            mode,
            events,
            markers: Mutex::new(HashMap::new()),
            sends: AtomicU32::new(0),
        })
    }

    pub fn send_count(&self) -> u32 {
        self.sends.load(Ordering::SeqCst)
    }

    fn payload_marker(transaction: &Transaction) -> u8 {
        // instruction 0 is the compute budget prologue
        transaction
            .message
            .instructions
            .get(1)
            .and_then(|ix| ix.data.first())
            .copied()
            .unwrap_or(u8::MAX)
    }
}

#[async_trait]
impl LedgerEndpoint for FakeEndpoint {
    fn url(&self) -> &str {
        &self.url
    }

    async fn latest_blockhash(&self) -> FeedResult<Hash> {
        match self.mode {
            FakeMode::FailBlockhash => Err(FeedError::network_lookup(format!(
                "{}: blockhash fetch refused",
                self.url
            ))),
            _ => Ok(Hash::new_unique()),
        }
    }

    async fn send_transaction(&self, transaction: &Transaction) -> FeedResult<Signature> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let marker = Self::payload_marker(transaction);
        self.events.lock().unwrap().push(LedgerEvent::Sent {
            endpoint: self.url.clone(),
            marker,
            signatures: transaction.signatures.len(),
        });
        if self.mode == FakeMode::FailSend {
            return Err(FeedError::network_lookup(format!(
                "{}: connection refused",
                self.url
            )));
        }
        let signature = transaction.signatures[0];
        self.markers.lock().unwrap().insert(signature, marker);
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> FeedResult<SignatureDisposition> {
        let marker = self
            .markers
            .lock()
            .unwrap()
            .get(signature)
            .copied()
            .unwrap_or(u8::MAX);
        match self.mode {
            FakeMode::Confirm | FakeMode::FailBlockhash => {
                self.events
                    .lock()
                    .unwrap()
                    .push(LedgerEvent::Confirmed { marker });
                Ok(SignatureDisposition::Confirmed)
            }
            FakeMode::RejectOnChain => Ok(SignatureDisposition::Failed(
                "custom program error: 0x1".to_string(),
            )),
            FakeMode::FailSend | FakeMode::NeverConfirm => Ok(SignatureDisposition::Pending),
        }
    }
}

/// Recording [`PoolInspector`] with a fixed answer.
pub struct FakePoolInspector {
    reversed: bool,
    pub calls: Mutex<Vec<(DexKind, Pubkey, Pubkey)>>,
}

impl FakePoolInspector {
    pub fn new(reversed: bool) -> Arc<Self> {
        Arc::new(Self {
            reversed,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PoolInspector for FakePoolInspector {
    async fn is_reversed(
        &self,
        kind: DexKind,
        pool: Pubkey,
        quote_mint: Pubkey,
    ) -> FeedResult<bool> {
        self.calls.lock().unwrap().push((kind, pool, quote_mint));
        Ok(self.reversed)
    }

    async fn account_info(&self, _address: Pubkey) -> FeedResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Recording [`OracleNetworkClient`] that emits marker instructions instead
/// of real program calls. The feed account keypair countersigns the create
/// bundle, as the real program requires.
pub struct FakeOracleClient {
    feed_keypair: Arc<Keypair>,
    queue_authority: Pubkey,
    crank_data_buffer: Pubkey,
    fail_queue_load: bool,
    pub seen_deployments: Mutex<Vec<FeedDeployment>>,
    pub seen_authority_handoffs: Mutex<Vec<Pubkey>>,
}

impl FakeOracleClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            feed_keypair: Arc::new(Keypair::new()),
            queue_authority: Pubkey::new_unique(),
            crank_data_buffer: Pubkey::new_unique(),
            fail_queue_load: false,
            seen_deployments: Mutex::new(Vec::new()),
            seen_authority_handoffs: Mutex::new(Vec::new()),
        })
    }

    pub fn with_failing_queue() -> Arc<Self> {
        let mut client = Self::new();
        Arc::get_mut(&mut client).unwrap().fail_queue_load = true;
        client
    }

    pub fn feed_pubkey(&self) -> Pubkey {
        self.feed_keypair.pubkey()
    }
}

#[async_trait]
impl OracleNetworkClient for FakeOracleClient {
    async fn load_queue(&self, queue: Pubkey) -> FeedResult<QueueHandle> {
        if self.fail_queue_load {
            return Err(FeedError::network_lookup("queue account missing"));
        }
        Ok(QueueHandle {
            pubkey: queue,
            authority: self.queue_authority,
        })
    }

    async fn load_crank(&self, crank: Pubkey) -> FeedResult<CrankHandle> {
        Ok(CrankHandle {
            pubkey: crank,
            data_buffer: self.crank_data_buffer,
        })
    }

    async fn create_feed_instructions(
        &self,
        _payer: Pubkey,
        deployment: &FeedDeployment,
    ) -> FeedResult<(FeedHandle, Vec<InstructionBundle>)> {
        self.seen_deployments
            .lock()
            .unwrap()
            .push(deployment.clone());
        let create = InstructionBundle::new(
            vec![marker_instruction(
                MARKER_CREATE_FEED,
                &[self.feed_keypair.pubkey()],
            )],
            vec![Arc::clone(&self.feed_keypair)],
        );
        let fund = InstructionBundle::new(
            vec![marker_instruction(MARKER_FUND_LEASE, &[])],
            Vec::new(),
        );
        Ok((
            FeedHandle {
                pubkey: self.feed_keypair.pubkey(),
            },
            vec![create, fund],
        ))
    }

    async fn lock_feed_instruction(
        &self,
        _feed: &FeedHandle,
        _payer: Pubkey,
    ) -> FeedResult<InstructionBundle> {
        Ok(InstructionBundle::new(
            vec![marker_instruction(MARKER_LOCK_FEED, &[])],
            Vec::new(),
        ))
    }

    async fn set_feed_authority_instruction(
        &self,
        _feed: &FeedHandle,
        _payer: Pubkey,
        new_authority: Pubkey,
    ) -> FeedResult<InstructionBundle> {
        self.seen_authority_handoffs
            .lock()
            .unwrap()
            .push(new_authority);
        Ok(InstructionBundle::new(
            vec![marker_instruction(MARKER_SET_AUTHORITY, &[])],
            Vec::new(),
        ))
    }
}

/// Recording [`Notifier`].
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotifyEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &NotifyEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Stake-pool templates emitting single value-task graphs, recording the
/// native amounts they were sized with.
#[derive(Default)]
pub struct FixtureTemplates {
    pub native_amounts: Mutex<Vec<u64>>,
}

impl FixtureTemplates {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl StakePoolTemplates for FixtureTemplates {
    fn exact_in(&self, base_mint: &Pubkey, native_amount: u64, stake_pool: &Pubkey) -> OracleJob {
        self.native_amounts.lock().unwrap().push(native_amount);
        OracleJob::single(Task::value(format!("in:{base_mint}:{stake_pool}")))
    }

    fn exact_out(&self, base_mint: &Pubkey, native_amount: u64, stake_pool: &Pubkey) -> OracleJob {
        self.native_amounts.lock().unwrap().push(native_amount);
        OracleJob::single(Task::value(format!("out:{base_mint}:{stake_pool}")))
    }
}
