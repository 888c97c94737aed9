//! Seam to the oracle network's on-chain program.
//!
//! The pipeline only ever talks to the program through
//! [`OracleNetworkClient`], so the program SDK stays out of the planning and
//! submission layers and tests can substitute recording fakes.

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;

use crate::errors::FeedResult;
use crate::jobs::assembler::FeedDeployment;

/// A created feed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedHandle {
    pub pubkey: Pubkey,
}

/// A loaded oracle queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueHandle {
    pub pubkey: Pubkey,
    pub authority: Pubkey,
}

/// A loaded crank and its data buffer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrankHandle {
    pub pubkey: Pubkey,
    pub data_buffer: Pubkey,
}

/// Instructions plus the extra keypairs that must sign them. The fee payer
/// is never carried here.
#[derive(Clone)]
pub struct InstructionBundle {
    pub instructions: Vec<Instruction>,
    pub signers: Vec<Arc<Keypair>>,
}

impl InstructionBundle {
    pub fn new(instructions: Vec<Instruction>, signers: Vec<Arc<Keypair>>) -> Self {
        Self {
            instructions,
            signers,
        }
    }
}

/// On-chain oracle program operations the pipeline needs.
#[async_trait]
pub trait OracleNetworkClient: Send + Sync {
    async fn load_queue(&self, queue: Pubkey) -> FeedResult<QueueHandle>;

    async fn load_crank(&self, crank: Pubkey) -> FeedResult<CrankHandle>;

    /// Builds every instruction needed to create and fund the feed,
    /// returning the new feed's address and the bundles in submission order.
    async fn create_feed_instructions(
        &self,
        payer: Pubkey,
        deployment: &FeedDeployment,
    ) -> FeedResult<(FeedHandle, Vec<InstructionBundle>)>;

    /// Locks the feed's job list against later edits.
    async fn lock_feed_instruction(
        &self,
        feed: &FeedHandle,
        payer: Pubkey,
    ) -> FeedResult<InstructionBundle>;

    /// Hands feed administration to its long-term authority.
    async fn set_feed_authority_instruction(
        &self,
        feed: &FeedHandle,
        payer: Pubkey,
        new_authority: Pubkey,
    ) -> FeedResult<InstructionBundle>;
}
