//! Error taxonomy for the feed creation pipeline.
//!
//! Every failure surfaced by this crate resolves to a [`FeedError`]. The
//! variants encode how the caller should react: configuration problems are
//! fatal and reported immediately, lookup failures bubble up without retry,
//! and submission failures are retried by the submitter and only surface
//! once the retry budget is exhausted.

use thiserror::Error;

pub type FeedResult<T> = Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Missing pool address, unknown tier, malformed address material.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Pool-reversal checks and account fetches that died on the wire.
    #[error("network lookup failed: {0}")]
    NetworkLookup(String),

    /// A transaction group that could not be landed.
    #[error("submission of group {group} failed: {reason}")]
    Submission { group: usize, reason: String },

    /// Earlier groups confirmed before a later one failed. Confirmed groups
    /// stay confirmed; nothing is rolled back.
    #[error("submission halted after {confirmed} of {total} groups: {reason}")]
    PartialCompletion {
        confirmed: usize,
        total: usize,
        reason: String,
    },

    /// Job graph could not be serialized for the oracle network.
    #[error("job encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Anything an external service raised that we do not model.
    #[error("unexpected error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl FeedError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn network_lookup(msg: impl Into<String>) -> Self {
        Self::NetworkLookup(msg.into())
    }

    pub fn submission(group: usize, reason: impl Into<String>) -> Self {
        Self::Submission {
            group,
            reason: reason.into(),
        }
    }

    /// Index of the last confirmed group, for partial completions.
    pub fn last_confirmed_group(&self) -> Option<usize> {
        match self {
            Self::PartialCompletion { confirmed, .. } => confirmed.checked_sub(1),
            _ => None,
        }
    }

    /// Whether resubmitting the same work can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Submission { .. })
    }

    /// Stable label for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::NetworkLookup(_) => "network_lookup",
            Self::Submission { .. } => "submission",
            Self::PartialCompletion { .. } => "partial_completion",
            Self::Encoding(_) => "encoding",
            Self::Unknown(_) => "unknown",
        }
    }
}
