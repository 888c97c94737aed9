//! Oracle feed listing pipeline for Solana.
//!
//! Builds fallback-aware price job graphs for new asset listings and drives
//! the resulting instruction stream through the ledger in size-bounded,
//! sequentially confirmed transaction groups with retry and endpoint
//! failover.

pub mod config;
pub mod creator;
pub mod errors;
pub mod jobs;
pub mod notify;
pub mod oracle;
pub mod planner;
pub mod pools;
pub mod submitter;
pub mod test_utils;

// Re-export commonly used types
pub use config::{FeedCtlConfig, OracleEnv};
pub use creator::{create_oracle_feed, FeedRequest, FeedServices};
pub use errors::{FeedError, FeedResult};
