//! Pool selection and inspection.
//!
//! A listing request may carry up to three candidate pools for the fallback
//! price path. Selection is deterministic (a staking pool wins, then Orca,
//! then Raydium) and happens before any network traffic, so a request with
//! no pool at all fails fast as a configuration error.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::errors::{FeedError, FeedResult};

/// DEX venues whose pools can back the fallback price computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DexKind {
    Orca,
    Raydium,
}

/// The pool chosen to back an asset's fallback price path. Staking pools
/// never go through the exchange-rate fallback, so they are a separate case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedPool {
    Dex { kind: DexKind, address: Pubkey },
    StakePool { address: Pubkey },
}

impl SelectedPool {
    pub fn address(&self) -> Pubkey {
        match self {
            Self::Dex { address, .. } | Self::StakePool { address } => *address,
        }
    }
}

/// Candidate pool addresses supplied with the listing request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolAddresses {
    pub orca: Option<Pubkey>,
    pub raydium: Option<Pubkey>,
    pub stake_pool: Option<Pubkey>,
}

impl PoolAddresses {
    pub fn orca(address: Pubkey) -> Self {
        Self {
            orca: Some(address),
            ..Self::default()
        }
    }

    pub fn raydium(address: Pubkey) -> Self {
        Self {
            raydium: Some(address),
            ..Self::default()
        }
    }

    pub fn stake_pool(address: Pubkey) -> Self {
        Self {
            stake_pool: Some(address),
            ..Self::default()
        }
    }

    /// Pick the pool backing the fallback price path. A staking pool wins
    /// over any DEX pool; between DEX pools Orca wins.
    pub fn select(&self) -> FeedResult<SelectedPool> {
        if let Some(address) = self.stake_pool {
            return Ok(SelectedPool::StakePool { address });
        }
        if let Some(address) = self.orca {
            return Ok(SelectedPool::Dex {
                kind: DexKind::Orca,
                address,
            });
        }
        if let Some(address) = self.raydium {
            return Ok(SelectedPool::Dex {
                kind: DexKind::Raydium,
                address,
            });
        }
        Err(FeedError::configuration("no pool address found for asset"))
    }
}

/// Read side of pool accounts. Implementations own the DEX-specific account
/// layout decoding; the pipeline only consumes the answers.
#[async_trait]
pub trait PoolInspector: Send + Sync {
    /// Whether the pool quotes base-per-quote instead of quote-per-base,
    /// i.e. its exchange rate needs a reciprocal to express the asset price.
    async fn is_reversed(
        &self,
        kind: DexKind,
        pool: Pubkey,
        quote_mint: Pubkey,
    ) -> FeedResult<bool>;

    /// Raw account bytes for `address`.
    async fn account_info(&self, address: Pubkey) -> FeedResult<Vec<u8>>;
}
